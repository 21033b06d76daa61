//! Frame orchestration
//!
//! [`Renderer`] owns the device and every pipeline resource. Each call to
//! [`Renderer::render_frame`] packs the frame parameters, then runs the passes
//! of the selected mode followed by bloom and composite:
//!
//! ```text
//! Deferred: Geometry -> Lighting -> Bloom -> Composite
//! Forward:  Forward  ->             Bloom -> Composite
//! ```
//!
//! Uniform memory is single-buffered. The forward pass owns one buffer with
//! the Global block and every Local record. The deferred pipeline keeps Local
//! records in a geometry buffer and the Global block in a lighting buffer, so
//! the two passes never share a mapped region.

use std::path::Path;

use crate::backend::{BufferKind, BufferUsage, DeviceResult, GraphicsDevice};
use crate::config::RendererConfig;
use crate::error::RendererResult;
use crate::resources::{
    GraphicsBuffer, Material, Mesh, Model, ProgramId, RenderTargets, ShaderRegistry, TextureData,
    TextureId, TextureRegistry,
};
use crate::scene::{ObjectId, Scene};

use super::params::{pack_global, pack_locals, GlobalLayout, GlobalParams, GLOBAL_BINDING};
use super::pass::{PassContext, RenderPass};
use super::postprocess::{BloomPass, CompositePass};
use super::{ForwardPass, FrameSettings, FrameStats, GeometryPass, LightingPass, PipelineMode};

/// Logical names of the programs the pipeline loads
pub mod program_names {
    pub const FORWARD: &str = "FORWARD";
    pub const GEOMETRY: &str = "GEOMETRY";
    pub const LIGHTING: &str = "LIGHTING";
    pub const BLUR_HORIZONTAL: &str = "BLUR_HORIZONTAL";
    pub const BLUR_VERTICAL: &str = "BLUR_VERTICAL";
    pub const COMPOSITE: &str = "COMPOSITE";
}

/// Registry name of the white texture sampled by meshes without an albedo map
pub const DEFAULT_ALBEDO: &str = "default_albedo";

pub struct Renderer<D: GraphicsDevice> {
    device: D,
    config: RendererConfig,
    display: (u32, u32),
    frame_index: u64,

    programs: ShaderRegistry,
    textures: TextureRegistry,
    default_albedo: TextureId,
    targets: RenderTargets,
    screen_quad: Model,

    forward_uniforms: GraphicsBuffer,
    geometry_uniforms: GraphicsBuffer,
    lighting_uniforms: GraphicsBuffer,

    geometry_pass: GeometryPass,
    lighting_pass: LightingPass,
    forward_pass: ForwardPass,
    bloom_pass: BloomPass,
    composite_pass: CompositePass,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Load the pipeline programs and create every display-sized resource.
    ///
    /// Programs that fail to build are logged and kept; see
    /// [`ShaderRegistry::load`].
    pub fn new(mut device: D, config: RendererConfig) -> RendererResult<Self> {
        let info = device.info();
        log::info!(
            "Renderer on {} ({}), version {}, {} extensions",
            info.renderer,
            info.vendor,
            info.version,
            info.extensions.len()
        );

        let mut programs = ShaderRegistry::with_version(config.glsl_version.clone());
        let files = &config.shaders;
        let forward = programs.load(&mut device, config.shader_path(&files.forward), program_names::FORWARD);
        let geometry = programs.load(&mut device, config.shader_path(&files.geometry), program_names::GEOMETRY);
        let lighting = programs.load(&mut device, config.shader_path(&files.lighting), program_names::LIGHTING);
        let blur_horizontal =
            programs.load(&mut device, config.shader_path(&files.blur), program_names::BLUR_HORIZONTAL);
        let blur_vertical =
            programs.load(&mut device, config.shader_path(&files.blur), program_names::BLUR_VERTICAL);
        let composite =
            programs.load(&mut device, config.shader_path(&files.composite), program_names::COMPOSITE);

        let mut textures = TextureRegistry::new();
        let default_albedo = textures.insert(&mut device, &TextureData::solid_color([255; 4], DEFAULT_ALBEDO))?;

        let display = (config.width.max(1), config.height.max(1));
        let targets = RenderTargets::new(&mut device, display.0, display.1)?;
        let screen_quad = Model::upload(&mut device, "screen_quad", vec![Mesh::quad()], Vec::new())?;

        let uniform_size = device.limits().max_uniform_block_size;
        let forward_uniforms = Self::create_uniforms(&mut device, uniform_size)?;
        let geometry_uniforms = Self::create_uniforms(&mut device, uniform_size)?;
        let lighting_uniforms = Self::create_uniforms(&mut device, uniform_size)?;

        Ok(Self {
            device,
            display,
            frame_index: 0,
            programs,
            textures,
            default_albedo,
            targets,
            screen_quad,
            forward_uniforms,
            geometry_uniforms,
            lighting_uniforms,
            geometry_pass: GeometryPass::new(geometry),
            lighting_pass: LightingPass::new(lighting),
            forward_pass: ForwardPass::new(forward),
            bloom_pass: BloomPass::new(blur_horizontal, blur_vertical, config.bloom_iterations),
            composite_pass: CompositePass::new(composite, config.bloom_iterations),
            config,
        })
    }

    fn create_uniforms(device: &mut D, size: u32) -> DeviceResult<GraphicsBuffer> {
        GraphicsBuffer::new(device, BufferKind::Uniform, size, BufferUsage::Stream)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn programs(&self) -> &ShaderRegistry {
        &self.programs
    }

    pub fn program(&self, name: &str) -> Option<ProgramId> {
        self.programs.find(name)
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    /// White texture bound in place of a missing albedo map
    pub fn default_albedo(&self) -> TextureId {
        self.default_albedo
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.display
    }

    /// Frames rendered so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// See [`TextureRegistry::load`]
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Option<TextureId> {
        self.textures.load(&mut self.device, path)
    }

    pub fn insert_texture(&mut self, data: &TextureData) -> DeviceResult<TextureId> {
        self.textures.insert(&mut self.device, data)
    }

    /// Upload meshes into one shared vertex and index buffer
    pub fn upload_model(&mut self, name: &str, meshes: Vec<Mesh>, materials: Vec<Material>) -> DeviceResult<Model> {
        Model::upload(&mut self.device, name, meshes, materials)
    }

    /// Remove an object from the scene and release its device resources.
    /// Other objects keep their ids.
    pub fn delete_object(&mut self, scene: &mut Scene, id: ObjectId) -> bool {
        match scene.remove(id) {
            Some(object) => {
                log::debug!("Deleted object '{}'", object.name);
                object.destroy(&mut self.device);
                true
            }
            None => false,
        }
    }

    /// Recreate every render target at the new display size. Zero sizes, as
    /// reported for minimized windows, are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> RendererResult<()> {
        if width == 0 || height == 0 || (width, height) == self.display {
            return Ok(());
        }
        self.targets.resize(&mut self.device, width, height)?;
        self.display = (width, height);
        log::info!("Resized render targets to {width}x{height}");
        Ok(())
    }

    /// Rebuild programs whose source file changed and return how many were
    /// rebuilt.
    pub fn hot_reload(&mut self) -> usize {
        self.programs.hot_reload(&mut self.device)
    }

    /// Render one frame of `scene` into the default framebuffer.
    ///
    /// Never fails: broken programs or incomplete targets produce wrong
    /// output and log messages. Each object's parameter range is updated.
    pub fn render_frame(&mut self, scene: &mut Scene, settings: &FrameSettings) -> FrameStats {
        if self.config.hot_reload {
            self.hot_reload();
        }

        let camera = &settings.camera;
        let view_projection = camera.view_projection(self.display);
        let globals = GlobalParams {
            camera_position: camera.position,
            ambient: settings.ambient,
            near: camera.near,
            far: camera.far,
            bloom_threshold: settings.bloom_threshold,
            black_white: settings.black_white,
        };
        let alignment = self.device.limits().uniform_buffer_offset_alignment;
        let max_lights = self.config.max_lights;

        match settings.mode {
            PipelineMode::Forward => {
                let layout = GlobalLayout::forward().with_max_lights(max_lights);
                self.forward_uniforms.bind(&mut self.device);
                let global = self.forward_uniforms.map_for_write(&mut self.device, |writer| {
                    let global = pack_global(writer, &layout, &globals, scene);
                    pack_locals(writer, scene, &view_projection, alignment);
                    global
                });
                self.forward_uniforms
                    .bind_range(&mut self.device, GLOBAL_BINDING, global.offset, global.size);
            }
            PipelineMode::Deferred => {
                let layout = GlobalLayout::deferred().with_max_lights(max_lights);
                self.lighting_uniforms.bind(&mut self.device);
                let global = self
                    .lighting_uniforms
                    .map_for_write(&mut self.device, |writer| pack_global(writer, &layout, &globals, scene));

                self.geometry_uniforms.bind(&mut self.device);
                self.geometry_uniforms.map_for_write(&mut self.device, |writer| {
                    pack_locals(writer, scene, &view_projection, alignment)
                });
                self.lighting_uniforms
                    .bind_range(&mut self.device, GLOBAL_BINDING, global.offset, global.size);
            }
        }

        let local_uniforms = match settings.mode {
            PipelineMode::Forward => &self.forward_uniforms,
            PipelineMode::Deferred => &self.geometry_uniforms,
        };
        let mut ctx = PassContext {
            device: &mut self.device,
            scene,
            programs: &self.programs,
            textures: &self.textures,
            default_albedo: self.textures.handle(self.default_albedo),
            targets: &self.targets,
            uniforms: local_uniforms,
            quad: &mut self.screen_quad,
            settings,
            display: self.display,
        };

        let mut stats = FrameStats::default();
        match settings.mode {
            PipelineMode::Deferred => {
                run_pass(&self.geometry_pass, &mut ctx, &mut stats);
                run_pass(&self.lighting_pass, &mut ctx, &mut stats);
            }
            PipelineMode::Forward => {
                run_pass(&self.forward_pass, &mut ctx, &mut stats);
            }
        }
        run_pass(&self.bloom_pass, &mut ctx, &mut stats);
        run_pass(&self.composite_pass, &mut ctx, &mut stats);

        self.frame_index += 1;
        log::debug!(
            "Frame {} ({:?}): {} draws {:?}",
            self.frame_index,
            settings.mode,
            stats.total_draws(),
            stats.passes
        );
        stats
    }

    /// Release every resource the renderer owns and hand the device back.
    /// Scene objects are released separately with [`Scene::clear`].
    pub fn destroy(mut self) -> D {
        self.programs.destroy(&mut self.device);
        self.textures.destroy(&mut self.device);
        self.targets.destroy(&mut self.device);
        self.screen_quad.destroy(&mut self.device);
        self.forward_uniforms.destroy(&mut self.device);
        self.geometry_uniforms.destroy(&mut self.device);
        self.lighting_uniforms.destroy(&mut self.device);
        self.device
    }
}

fn run_pass<D: GraphicsDevice, P: RenderPass<D>>(
    pass: &P,
    ctx: &mut PassContext<'_, D>,
    stats: &mut FrameStats,
) {
    ctx.device.push_debug_group(pass.name());
    let draws = pass.execute(ctx);
    ctx.device.pop_debug_group();
    stats.passes.push((pass.kind(), draws));
}
