//! # Headless Demo
//!
//! Renders a small scene through the headless device and prints what each
//! frame drew. Useful for checking shader edits and pipeline changes without a
//! window or GPU.
//!
//! ```bash
//! cargo run --example headless -- --mode forward --frames 4
//! cargo run --example headless -- --config renderer.toml --debug-target normals
//! ```

use std::path::PathBuf;

use clap::Parser;
use deferred_renderer::backend::headless::HeadlessDevice;
use deferred_renderer::resources::{Material, MaterialChannel, Mesh, TextureData};
use deferred_renderer::scene::{Light, Scene, Transform};
use deferred_renderer::{FrameSettings, PipelineMode, RenderTarget, Renderer, RendererConfig, RendererResult};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliMode {
    Forward,
    Deferred,
}

impl From<CliMode> for PipelineMode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::Forward => PipelineMode::Forward,
            CliMode::Deferred => PipelineMode::Deferred,
        }
    }
}

/// Render target shown on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliTarget {
    #[default]
    Final,
    Specular,
    Normals,
    Position,
    Albedo,
    Depth,
}

impl From<CliTarget> for RenderTarget {
    fn from(cli: CliTarget) -> Self {
        match cli {
            CliTarget::Final => RenderTarget::Final,
            CliTarget::Specular => RenderTarget::Specular,
            CliTarget::Normals => RenderTarget::Normals,
            CliTarget::Position => RenderTarget::Position,
            CliTarget::Albedo => RenderTarget::Albedo,
            CliTarget::Depth => RenderTarget::Depth,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Render a test scene with the headless device")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pipeline mode, overriding the configuration
    #[arg(long, value_enum)]
    mode: Option<CliMode>,

    /// Number of frames to render
    #[arg(long, default_value_t = 3)]
    frames: u32,

    /// Directory holding the shader files
    #[arg(long)]
    shader_dir: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long, value_enum, default_value_t = CliTarget::Final)]
    debug_target: CliTarget,

    /// Render in grayscale (deferred only)
    #[arg(long)]
    black_white: bool,
}

fn build_scene(renderer: &mut Renderer<HeadlessDevice>) -> RendererResult<Scene> {
    let mut scene = Scene::new();

    let checker = renderer.insert_texture(&TextureData::checkerboard(64, [40, 40, 40, 255], [200, 200, 200, 255]))?;
    let floor = renderer.upload_model(
        "floor",
        vec![Mesh::plane(10.0, 10.0, 4).with_material(0)],
        vec![Material::new("floor").with_texture(MaterialChannel::Albedo, checker)],
    )?;
    scene.add_model(floor, Transform::from_position(Vec3::new(0.0, -1.0, 0.0)));

    let cube = renderer.upload_model("cube", vec![Mesh::cube()], Vec::new())?;
    scene.add_model(cube, Transform::from_euler_degrees(Vec3::new(-1.5, 0.0, 0.0), Vec3::new(0.0, 45.0, 0.0)));

    let sphere = renderer.upload_model("sphere", vec![Mesh::sphere(32, 16)], Vec::new())?;
    scene.add_model(sphere, Transform::from_position(Vec3::new(1.5, 0.0, 0.0)));

    scene.add_directional_light(Vec3::splat(0.3), Vec3::new(-0.3, -1.0, -0.2));
    scene.add_point_light(Vec3::new(1.0, 0.6, 0.2), Vec3::new(0.0, 1.5, 2.0));
    scene.add_light(
        "spot",
        Light::spot(Vec3::ONE, -Vec3::Y, 20.0).with_intensity(4.0),
        Transform::from_position(Vec3::new(0.0, 4.0, 0.0)),
    );

    Ok(scene)
}

fn main() -> RendererResult<()> {
    deferred_renderer::init_logging("info");
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RendererConfig::load(path)?,
        None => RendererConfig::default(),
    };
    if let Some(dir) = args.shader_dir {
        config.shader_dir = dir;
    }
    config.width = args.width.unwrap_or(config.width);
    config.height = args.height.unwrap_or(config.height);

    let defaults = config.frame_settings();
    let settings = FrameSettings {
        mode: args.mode.map(PipelineMode::from).unwrap_or(defaults.mode),
        debug_target: args.debug_target.into(),
        black_white: args.black_white,
        ..defaults
    };

    let mut renderer = Renderer::new(HeadlessDevice::new(), config)?;
    let mut scene = build_scene(&mut renderer)?;

    let mut frame = settings;
    for index in 0..args.frames {
        let angle = index as f32 * 0.25;
        frame
            .camera
            .set_position(Vec3::new(8.0 * angle.sin(), 2.0, 8.0 * angle.cos()));

        let stats = renderer.render_frame(&mut scene, &frame);
        println!("frame {}: {} draws", renderer.frame_index(), stats.total_draws());
        for (kind, draws) in &stats.passes {
            println!("  {kind:?}: {draws}");
        }
        renderer.device_mut().take_draws();
    }

    let device_stats = renderer.device().stats();
    println!("{device_stats:?}");

    let mut device = renderer.destroy();
    scene.clear(&mut device);
    Ok(())
}
