//! Final composite onto the default framebuffer
//!
//! Samples the selected debug target at slot 0 and the bloom result at slot 1.

use crate::backend::{GraphicsDevice, TextureHandle};
use crate::resources::{AttachmentKind, ProgramId, RenderTargets};

use crate::pipeline::pass::{bind_texture, draw_screen_quad, PassContext, PassKind, RenderPass};
use crate::pipeline::{PipelineMode, RenderTarget};
use super::BloomPass;

pub struct CompositePass {
    program: ProgramId,
    bloom_iterations: u32,
}

impl CompositePass {
    pub const TARGET_SLOT: u32 = 0;
    pub const BLOOM_SLOT: u32 = 1;

    pub fn new(program: ProgramId, bloom_iterations: u32) -> Self {
        Self {
            program,
            bloom_iterations,
        }
    }

    /// Image shown for `target`. Depth comes from the geometry buffer when
    /// deferred and from the lighting buffer when forward; every color
    /// target comes from the lighting buffer.
    pub fn source(targets: &RenderTargets, target: RenderTarget, mode: PipelineMode) -> Option<TextureHandle> {
        let lighting = &targets.lighting;
        match target {
            RenderTarget::Final => lighting.attachment(AttachmentKind::Final),
            RenderTarget::Specular => lighting.attachment(AttachmentKind::Specular),
            RenderTarget::Normals => lighting.attachment(AttachmentKind::Normals),
            RenderTarget::Position => lighting.attachment(AttachmentKind::Position),
            RenderTarget::Albedo => lighting.attachment(AttachmentKind::Albedo),
            RenderTarget::Depth => match mode {
                PipelineMode::Deferred => targets.geometry.depth(),
                PipelineMode::Forward => lighting.depth(),
            },
        }
    }
}

impl<D: GraphicsDevice> RenderPass<D> for CompositePass {
    fn name(&self) -> &str {
        "Composite"
    }

    fn kind(&self) -> PassKind {
        PassKind::Composite
    }

    fn execute(&self, ctx: &mut PassContext<'_, D>) -> u32 {
        let settings = ctx.settings;
        let (width, height) = ctx.display;

        ctx.device.bind_framebuffer(None);
        ctx.device.set_viewport(width, height);
        ctx.device.set_depth_test(false);
        ctx.device.clear(settings.clear_color, true);

        let program = ctx.programs.get(self.program);
        ctx.device.use_program(Some(program.handle()));
        bind_texture(
            ctx.device,
            Self::TARGET_SLOT,
            Self::source(ctx.targets, settings.debug_target, settings.mode),
        );
        bind_texture(
            ctx.device,
            Self::BLOOM_SLOT,
            BloomPass::result(ctx.targets, self.bloom_iterations),
        );

        let draws = draw_screen_quad(ctx.device, ctx.quad, program);
        ctx.device.use_program(None);
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessDevice;

    #[test]
    fn test_depth_source_follows_mode() {
        let mut device = HeadlessDevice::new();
        let targets = RenderTargets::new(&mut device, 8, 8).unwrap();

        assert_eq!(
            CompositePass::source(&targets, RenderTarget::Depth, PipelineMode::Deferred),
            targets.geometry.depth()
        );
        assert_eq!(
            CompositePass::source(&targets, RenderTarget::Depth, PipelineMode::Forward),
            targets.lighting.depth()
        );
        assert_eq!(
            CompositePass::source(&targets, RenderTarget::Albedo, PipelineMode::Deferred),
            targets.lighting.attachment(AttachmentKind::Albedo)
        );
    }
}
