//! Bloom post-processing effect
//!
//! Separable blur of the lighting buffer's bloom attachment, ping-ponging
//! between the two blur buffers. Even iterations blur horizontally, odd ones
//! vertically. Each iteration reads the previous iteration's output (the
//! bloom attachment on the first one) and writes the other buffer.

use crate::backend::{GraphicsDevice, TextureHandle};
use crate::resources::{AttachmentKind, ProgramId, RenderTargets};

use crate::pipeline::pass::{bind_texture, draw_screen_quad, PassContext, PassKind, RenderPass};

pub const DEFAULT_BLOOM_ITERATIONS: u32 = 10;

/// Bloom pass
pub struct BloomPass {
    horizontal: ProgramId,
    vertical: ProgramId,
    iterations: u32,
}

impl BloomPass {
    pub fn new(horizontal: ProgramId, vertical: ProgramId, iterations: u32) -> Self {
        Self {
            horizontal,
            vertical,
            iterations,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Blur buffer written by `iteration`
    fn target_index(iteration: u32) -> usize {
        (iteration % 2) as usize
    }

    /// Image holding the blurred result after `iterations` iterations. With no
    /// iterations this is the unblurred bloom attachment.
    pub fn result(targets: &RenderTargets, iterations: u32) -> Option<TextureHandle> {
        match iterations {
            0 => targets.lighting.attachment(AttachmentKind::Bloom),
            n => targets.blur.texture(Self::target_index(n - 1)),
        }
    }
}

impl<D: GraphicsDevice> RenderPass<D> for BloomPass {
    fn name(&self) -> &str {
        "Bloom"
    }

    fn kind(&self) -> PassKind {
        PassKind::Bloom
    }

    fn execute(&self, ctx: &mut PassContext<'_, D>) -> u32 {
        let targets = ctx.targets;
        ctx.device.set_depth_test(false);

        let mut draws = 0;
        for iteration in 0..self.iterations {
            let program = if iteration % 2 == 0 {
                ctx.programs.get(self.horizontal)
            } else {
                ctx.programs.get(self.vertical)
            };
            let source = Self::result(targets, iteration);

            targets.blur.get(Self::target_index(iteration)).bind(ctx.device);
            // Later iterations overwrite every pixel
            if iteration < 2 {
                ctx.device.clear([0.0, 0.0, 0.0, 0.0], false);
            }

            ctx.device.use_program(Some(program.handle()));
            bind_texture(ctx.device, 0, source);
            draws += draw_screen_quad(ctx.device, ctx.quad, program);
        }

        ctx.device.use_program(None);
        draws
    }
}
