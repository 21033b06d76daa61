//! Render pipeline
//!
//! Two pipelines share one post-processing chain:
//! 1. Deferred: geometry pass into the geometry buffer, then a full-screen
//!    lighting pass into the lighting buffer
//! 2. Forward: one forward pass straight into the lighting buffer
//!
//! Both continue with a separable bloom over the lighting buffer's bloom
//! attachment and a composite onto the default framebuffer. The mode is read
//! once per frame from [`FrameSettings`]; nothing carries over between modes.

pub mod forward_pass;
pub mod geometry_pass;
pub mod lighting_pass;
pub mod params;
pub mod pass;
pub mod postprocess;
pub mod renderer;

pub use forward_pass::ForwardPass;
pub use geometry_pass::GeometryPass;
pub use lighting_pass::LightingPass;
pub use params::{GlobalLayout, GlobalParams};
pub use pass::{PassContext, PassKind, RenderPass};
pub use postprocess::{BloomPass, CompositePass};
pub use renderer::Renderer;

use serde::Deserialize;

use crate::scene::Camera;

/// Which pipeline renders the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    Forward,
    #[default]
    Deferred,
}

/// Image shown by the composite pass
///
/// Anything other than [`RenderTarget::Final`] is a diagnostic view of an
/// intermediate attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderTarget {
    #[default]
    Final,
    Specular,
    Normals,
    Position,
    Albedo,
    /// Geometry-buffer depth in deferred mode, lighting-buffer depth in
    /// forward mode
    Depth,
}

impl RenderTarget {
    pub const ALL: [RenderTarget; 6] = [
        RenderTarget::Final,
        RenderTarget::Specular,
        RenderTarget::Normals,
        RenderTarget::Position,
        RenderTarget::Albedo,
        RenderTarget::Depth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RenderTarget::Final => "FINAL",
            RenderTarget::Specular => "SPECULAR",
            RenderTarget::Normals => "NORMALS",
            RenderTarget::Position => "POSITION",
            RenderTarget::Albedo => "ALBEDO",
            RenderTarget::Depth => "DEPTH",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Per-frame render state, passed to [`Renderer::render_frame`]
#[derive(Debug, Clone)]
pub struct FrameSettings {
    pub mode: PipelineMode,
    pub camera: Camera,
    pub ambient: f32,
    pub bloom_threshold: f32,
    /// Grayscale output (deferred only)
    pub black_white: bool,
    pub debug_target: RenderTarget,
    pub clear_color: [f32; 4],
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            camera: Camera::default(),
            ambient: 0.1,
            bloom_threshold: 1.0,
            black_white: false,
            debug_target: RenderTarget::Final,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Draw calls issued by each pass of one frame, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: Vec<(PassKind, u32)>,
}

impl FrameStats {
    /// Draws issued by `kind`, zero if it did not run
    pub fn draws(&self, kind: PassKind) -> u32 {
        self.passes
            .iter()
            .filter(|(pass, _)| *pass == kind)
            .map(|(_, draws)| draws)
            .sum()
    }

    pub fn total_draws(&self) -> u32 {
        self.passes.iter().map(|(_, draws)| draws).sum()
    }

    pub fn ran(&self, kind: PassKind) -> bool {
        self.passes.iter().any(|(pass, _)| *pass == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_target_names() {
        let names: Vec<_> = RenderTarget::ALL.iter().map(RenderTarget::name).collect();
        assert_eq!(names, ["FINAL", "SPECULAR", "NORMALS", "POSITION", "ALBEDO", "DEPTH"]);
        assert_eq!(RenderTarget::from_index(5), Some(RenderTarget::Depth));
        assert_eq!(RenderTarget::from_index(6), None);
    }

    #[test]
    fn test_frame_stats_totals() {
        let stats = FrameStats {
            passes: vec![(PassKind::Forward, 2), (PassKind::Bloom, 10), (PassKind::Composite, 1)],
        };
        assert_eq!(stats.total_draws(), 13);
        assert_eq!(stats.draws(PassKind::Bloom), 10);
        assert_eq!(stats.draws(PassKind::Geometry), 0);
        assert!(!stats.ran(PassKind::Lighting));
    }
}
