//! Post-processing passes

mod bloom;
mod composite;

pub use bloom::{BloomPass, DEFAULT_BLOOM_ITERATIONS};
pub use composite::CompositePass;
