//! Deferred Renderer - forward and deferred rasterization over an
//! immediate-mode graphics device
//!
//! The crate covers the pipeline core of an interactive renderer:
//! - GPU buffers with aligned, scoped writes and range binding
//! - Render-target sets (geometry buffer, lighting buffer, blur ping-pong)
//! - A shader program registry with vertex input reflection and hot reload
//! - Per-mesh vertex array caching keyed by program
//! - Per-frame std140 parameter packing
//! - Forward or deferred passes followed by bloom and composite
//!
//! Rendering goes through the [`backend::GraphicsDevice`] trait. The
//! [`backend::headless::HeadlessDevice`] records everything in memory and runs
//! without a GPU; with the `gl` feature [`backend::gl::GlDevice`] drives an
//! OpenGL 4.5 context supplied by the platform layer.
//!
//! # Example
//!
//! ```ignore
//! let mut renderer = Renderer::new(HeadlessDevice::new(), RendererConfig::default())?;
//! let mut scene = Scene::new();
//! let cube = renderer.upload_model("cube", vec![Mesh::cube()], Vec::new())?;
//! scene.add_model(cube, Transform::default());
//! scene.add_spot_light(Vec3::ONE, Vec3::new(0.0, 4.0, 0.0), -Vec3::Y, 20.0);
//!
//! let stats = renderer.render_frame(&mut scene, &FrameSettings::default());
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resources;
pub mod scene;

pub use config::RendererConfig;
pub use error::{RendererError, RendererResult};
pub use pipeline::{FrameSettings, FrameStats, PipelineMode, RenderTarget, Renderer};

/// Install `env_logger`, honouring `RUST_LOG` and falling back to
/// `default_filter`. Safe to call more than once.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}
