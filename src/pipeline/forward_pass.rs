//! Forward pass
//!
//! Shades every active drawable directly into the lighting buffer, filling
//! the same attachments the deferred lighting pass does.

use crate::backend::GraphicsDevice;
use crate::resources::ProgramId;

use super::pass::{draw_scene_objects, PassContext, PassKind, RenderPass};

pub struct ForwardPass {
    program: ProgramId,
}

impl ForwardPass {
    pub fn new(program: ProgramId) -> Self {
        Self { program }
    }
}

impl<D: GraphicsDevice> RenderPass<D> for ForwardPass {
    fn name(&self) -> &str {
        "Forward Pass"
    }

    fn kind(&self) -> PassKind {
        PassKind::Forward
    }

    fn execute(&self, ctx: &mut PassContext<'_, D>) -> u32 {
        ctx.targets.lighting.bind(ctx.device);
        ctx.device.set_depth_test(true);
        ctx.device.clear(ctx.settings.clear_color, true);

        draw_scene_objects(ctx, self.program)
    }
}
