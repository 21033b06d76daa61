//! Geometry pass for deferred rendering
//!
//! Rasterizes every active drawable into the geometry buffer:
//! - Specular
//! - World-space normals
//! - World-space position
//! - Albedo
//! - Depth

use crate::backend::GraphicsDevice;
use crate::resources::ProgramId;

use super::pass::{draw_scene_objects, PassContext, PassKind, RenderPass};

pub struct GeometryPass {
    program: ProgramId,
}

impl GeometryPass {
    pub fn new(program: ProgramId) -> Self {
        Self { program }
    }
}

impl<D: GraphicsDevice> RenderPass<D> for GeometryPass {
    fn name(&self) -> &str {
        "Geometry Pass"
    }

    fn kind(&self) -> PassKind {
        PassKind::Geometry
    }

    fn execute(&self, ctx: &mut PassContext<'_, D>) -> u32 {
        ctx.targets.geometry.bind(ctx.device);
        ctx.device.set_depth_test(true);
        ctx.device.clear([0.0, 0.0, 0.0, 0.0], true);

        draw_scene_objects(ctx, self.program)
    }
}
