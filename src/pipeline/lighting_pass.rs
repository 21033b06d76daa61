//! Lighting pass for deferred rendering
//!
//! Full-screen pass that shades the geometry buffer into the lighting buffer.
//! Geometry attachments are bound by a fixed slot convention, see
//! [`LightingPass::SLOTS`].

use crate::backend::GraphicsDevice;
use crate::resources::{AttachmentKind, ProgramId};

use super::pass::{bind_texture, draw_screen_quad, PassContext, PassKind, RenderPass};

pub struct LightingPass {
    program: ProgramId,
}

impl LightingPass {
    /// Texture slot of each geometry attachment
    pub const SLOTS: [(AttachmentKind, u32); 4] = [
        (AttachmentKind::Specular, 0),
        (AttachmentKind::Normals, 1),
        (AttachmentKind::Position, 2),
        (AttachmentKind::Albedo, 3),
    ];

    /// Texture slot of the geometry depth
    pub const DEPTH_SLOT: u32 = 4;

    pub fn new(program: ProgramId) -> Self {
        Self { program }
    }
}

impl<D: GraphicsDevice> RenderPass<D> for LightingPass {
    fn name(&self) -> &str {
        "Lighting Pass"
    }

    fn kind(&self) -> PassKind {
        PassKind::Lighting
    }

    fn execute(&self, ctx: &mut PassContext<'_, D>) -> u32 {
        let geometry = &ctx.targets.geometry;
        ctx.targets.lighting.bind(ctx.device);
        ctx.device.set_depth_test(false);
        ctx.device.clear(ctx.settings.clear_color, true);

        let program = ctx.programs.get(self.program);
        ctx.device.use_program(Some(program.handle()));
        for (kind, slot) in Self::SLOTS {
            bind_texture(ctx.device, slot, geometry.attachment(kind));
        }
        bind_texture(ctx.device, Self::DEPTH_SLOT, geometry.depth());

        let draws = draw_screen_quad(ctx.device, ctx.quad, program);
        ctx.device.use_program(None);
        draws
    }
}
