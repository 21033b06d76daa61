//! Renderer configuration
//!
//! Startup settings, usually read from a `renderer.toml`:
//!
//! ```toml
//! width = 1280
//! height = 720
//! mode = "deferred"
//! shader_dir = "shaders"
//! bloom_iterations = 10
//! hot_reload = true
//!
//! [shaders]
//! forward = "forward.glsl"
//! ```
//!
//! Every field is optional and falls back to [`RendererConfig::default`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RendererError, RendererResult};
use crate::pipeline::params::GlobalLayout;
use crate::pipeline::postprocess::DEFAULT_BLOOM_ITERATIONS;
use crate::pipeline::{FrameSettings, PipelineMode};
use crate::resources::ShaderRegistry;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Initial display width
    pub width: u32,
    /// Initial display height
    pub height: u32,
    /// Pipeline used when a frame doesn't ask for one
    pub mode: PipelineMode,
    /// Directory the shader files are resolved against
    pub shader_dir: PathBuf,
    pub shaders: ShaderFiles,
    /// Version directive prepended to every shader stage
    pub glsl_version: String,
    pub bloom_iterations: u32,
    /// Light array length declared by the shaders
    pub max_lights: u32,
    /// Clear color of every render target, copied into each frame's settings
    pub clear_color: [f32; 4],
    /// Poll shader files for changes at the start of every frame
    pub hot_reload: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            mode: PipelineMode::Deferred,
            shader_dir: PathBuf::from("shaders"),
            shaders: ShaderFiles::default(),
            glsl_version: ShaderRegistry::DEFAULT_VERSION.to_string(),
            bloom_iterations: DEFAULT_BLOOM_ITERATIONS,
            max_lights: GlobalLayout::DEFAULT_MAX_LIGHTS,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            hot_reload: false,
        }
    }
}

/// Source file of each program, relative to `shader_dir`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaderFiles {
    pub forward: PathBuf,
    pub geometry: PathBuf,
    pub lighting: PathBuf,
    /// Serves both blur directions
    pub blur: PathBuf,
    pub composite: PathBuf,
}

impl Default for ShaderFiles {
    fn default() -> Self {
        Self {
            forward: PathBuf::from("forward.glsl"),
            geometry: PathBuf::from("geometry.glsl"),
            lighting: PathBuf::from("lighting.glsl"),
            blur: PathBuf::from("blur.glsl"),
            composite: PathBuf::from("composite.glsl"),
        }
    }
}

impl RendererConfig {
    pub fn from_toml_str(content: &str) -> RendererResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read a TOML file
    pub fn load(path: impl AsRef<Path>) -> RendererResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RendererError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_shader_dir(mut self, shader_dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = shader_dir.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Starting [`FrameSettings`] carrying the configured mode and clear color
    pub fn frame_settings(&self) -> FrameSettings {
        FrameSettings {
            mode: self.mode,
            clear_color: self.clear_color,
            ..Default::default()
        }
    }

    /// Full path of a shader file
    pub fn shader_path(&self, file: &Path) -> PathBuf {
        self.shader_dir.join(file)
    }
}
