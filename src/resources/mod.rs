//! Resource management
//!
//! GPU buffers, render targets, shader programs, meshes, textures and
//! materials.

mod buffer;
mod framebuffer;
mod material;
mod mesh;
mod shader;
mod texture;

pub use buffer::*;
pub use framebuffer::*;
pub use material::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;
