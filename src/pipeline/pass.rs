//! Render pass definitions

use crate::backend::{GraphicsDevice, TextureHandle};
use crate::resources::{
    GraphicsBuffer, MaterialChannel, Model, ProgramId, RenderTargets, ShaderProgram,
    ShaderRegistry, TextureRegistry,
};
use crate::scene::{ObjectKind, Scene};

use super::params::LOCAL_BINDING;
use super::FrameSettings;

/// Identifies a pass in [`super::FrameStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Geometry,
    Lighting,
    Forward,
    Bloom,
    Composite,
}

/// Everything a pass may touch while it executes
pub struct PassContext<'a, D: GraphicsDevice> {
    pub device: &'a mut D,
    pub scene: &'a mut Scene,
    pub programs: &'a ShaderRegistry,
    pub textures: &'a TextureRegistry,
    /// Bound at slot 0 for objects without an albedo texture
    pub default_albedo: TextureHandle,
    pub targets: &'a RenderTargets,
    /// Buffer holding the Local records packed for this pass
    pub uniforms: &'a GraphicsBuffer,
    /// Shared quad used for full-screen draws and scene quads
    pub quad: &'a mut Model,
    pub settings: &'a FrameSettings,
    /// Size of the default framebuffer
    pub display: (u32, u32),
}

/// One step of a frame
///
/// Passes never fail: problems are logged and show up as wrong output.
pub trait RenderPass<D: GraphicsDevice> {
    fn name(&self) -> &str;

    fn kind(&self) -> PassKind;

    /// Record the pass and return the number of draw calls issued
    fn execute(&self, ctx: &mut PassContext<'_, D>) -> u32;
}

/// Bind `texture` to `slot`. An absent texture leaves the slot untouched.
pub fn bind_texture<D: GraphicsDevice>(device: &mut D, slot: u32, texture: Option<TextureHandle>) {
    if let Some(texture) = texture {
        device.bind_texture(slot, Some(texture));
    }
}

/// Draw the shared quad with `program`, which must already be in use.
pub fn draw_screen_quad<D: GraphicsDevice>(
    device: &mut D,
    quad: &mut Model,
    program: &ShaderProgram,
) -> u32 {
    match quad.draw_mesh(device, 0, program) {
        Ok(()) => 1,
        Err(err) => {
            log::error!("Failed to draw screen quad with '{}': {err}", program.name());
            0
        }
    }
}

/// Draw every active model mesh and quad of the scene with `program`.
///
/// Each object's Local record is bound at [`LOCAL_BINDING`] and its albedo
/// texture at slot 0. Objects without one get the context's default albedo,
/// so slot 0 never keeps a render target from an earlier pass bound.
pub fn draw_scene_objects<D: GraphicsDevice>(ctx: &mut PassContext<'_, D>, program: ProgramId) -> u32 {
    let programs = ctx.programs;
    let textures = ctx.textures;
    let default_albedo = ctx.default_albedo;
    let program = programs.get(program);
    ctx.device.use_program(Some(program.handle()));

    let mut draws = 0;
    for (_, object) in ctx.scene.iter_mut() {
        // an empty range means the record did not fit this frame
        if !object.active || !object.is_drawable() || object.params.size == 0 {
            continue;
        }
        ctx.uniforms
            .bind_range(ctx.device, LOCAL_BINDING, object.params.offset, object.params.size);

        match &mut object.kind {
            ObjectKind::Model(model) => {
                for mesh in 0..model.meshes.len() {
                    let albedo = model
                        .material(mesh)
                        .and_then(|material| material.texture(MaterialChannel::Albedo))
                        .map_or(default_albedo, |id| textures.handle(id));
                    ctx.device.bind_texture(0, Some(albedo));

                    match model.draw_mesh(ctx.device, mesh, program) {
                        Ok(()) => draws += 1,
                        Err(err) => log::error!(
                            "Failed to draw mesh {} of '{}': {err}",
                            mesh,
                            object.name
                        ),
                    }
                }
            }
            ObjectKind::Quad(quad) => {
                let texture = quad.texture.map_or(default_albedo, |id| textures.handle(id));
                ctx.device.bind_texture(0, Some(texture));
                draws += draw_screen_quad(ctx.device, ctx.quad, program);
            }
            ObjectKind::Light(_) => {}
        }
    }

    ctx.device.use_program(None);
    draws
}
