//! Device abstraction layer
//!
//! Provides the immediate-mode device interface the pipeline draws through, an
//! OpenGL implementation and a headless implementation used by tests and tools.

pub mod headless;
pub mod traits;
pub mod types;

#[cfg(all(feature = "gl", not(target_arch = "wasm32")))]
pub mod gl;

pub use traits::*;
pub use types::*;
