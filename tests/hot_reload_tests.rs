//! Shader hot reload against real files on disk.

mod common;

use std::path::Path;

use common::{rewrite, temp_dir, touch, BROKEN_SHADER, POSITION_NORMAL_SHADER, POSITION_ONLY_SHADER};
use deferred_renderer::backend::headless::HeadlessDevice;
use deferred_renderer::pipeline::renderer::program_names;
use deferred_renderer::resources::{ProgramId, ShaderRegistry};
use deferred_renderer::{FrameSettings, PipelineMode, Renderer, RendererConfig};

fn registry_with_file(dir: &Path, source: &str) -> (HeadlessDevice, ShaderRegistry, ProgramId) {
    let path = dir.join("test.glsl");
    std::fs::write(&path, source).unwrap();

    let mut device = HeadlessDevice::new();
    let mut registry = ShaderRegistry::new();
    let id = registry.load(&mut device, &path, "TEST");
    (device, registry, id)
}

#[test]
fn test_unchanged_files_are_not_rebuilt() {
    let dir = temp_dir("unchanged");
    let (mut device, mut registry, id) = registry_with_file(&dir, POSITION_ONLY_SHADER);
    assert!(registry.get(id).is_linked());

    assert_eq!(registry.hot_reload(&mut device), 0);
    assert_eq!(device.stats().programs_built, 1);

    touch(&dir.join("test.glsl"), 5);
    assert_eq!(registry.hot_reload(&mut device), 1);
    assert_eq!(registry.hot_reload(&mut device), 0);
}

#[test]
fn test_broken_edit_keeps_previous_program() {
    let dir = temp_dir("broken");
    let (mut device, mut registry, id) = registry_with_file(&dir, POSITION_ONLY_SHADER);
    let before = registry.get(id).handle();

    rewrite(&dir.join("test.glsl"), BROKEN_SHADER);
    assert_eq!(registry.hot_reload(&mut device), 1);

    let program = registry.get(id);
    assert_eq!(program.handle(), before);
    assert!(program.is_linked());
    assert!(device.is_program_alive(before));
    // the failed build was released
    assert_eq!(device.live_programs(), 1);

    // not retried until the file changes again
    assert_eq!(registry.hot_reload(&mut device), 0);
}

#[test]
fn test_fixed_edit_swaps_program() {
    let dir = temp_dir("fixed");
    let (mut device, mut registry, id) = registry_with_file(&dir, POSITION_ONLY_SHADER);
    let before = registry.get(id).handle();
    assert_eq!(registry.get(id).inputs().len(), 1);

    rewrite(&dir.join("test.glsl"), POSITION_NORMAL_SHADER);
    assert_eq!(registry.hot_reload(&mut device), 1);

    let program = registry.get(id);
    assert_ne!(program.handle(), before);
    assert!(!device.is_program_alive(before));
    assert!(device.is_program_alive(program.handle()));
    assert_eq!(program.inputs().len(), 2);
    assert_eq!(device.stats().programs_deleted, 1);
}

#[test]
fn test_missing_file_is_picked_up_once_written() {
    let dir = temp_dir("missing");
    let path = dir.join("late.glsl");

    let mut device = HeadlessDevice::new();
    let mut registry = ShaderRegistry::new();
    let id = registry.load(&mut device, &path, "LATE");
    assert!(!registry.get(id).is_linked());

    std::fs::write(&path, POSITION_ONLY_SHADER).unwrap();
    assert_eq!(registry.hot_reload(&mut device), 1);
    assert!(registry.get(id).is_linked());
}

#[test]
fn test_renderer_reloads_before_each_frame() {
    let dir = temp_dir("renderer");
    for entry in std::fs::read_dir(common::shader_dir()).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), dir.join(entry.file_name())).unwrap();
    }

    deferred_renderer::init_logging("warn");
    let mut config = common::test_config().with_shader_dir(&dir);
    config.hot_reload = true;
    let mut renderer = Renderer::new(HeadlessDevice::new(), config).unwrap();
    let mut test = common::two_meshes_and_spot(&mut renderer);
    let frame = FrameSettings {
        mode: PipelineMode::Forward,
        ..Default::default()
    };
    renderer.render_frame(&mut test.scene, &frame);
    let forward = renderer.program(program_names::FORWARD).unwrap();
    let shipped = renderer.programs().get(forward).handle();
    assert_eq!(renderer.programs().get(forward).inputs().len(), 3);

    rewrite(&dir.join("forward.glsl"), POSITION_ONLY_SHADER);
    renderer.device_mut().take_draws();
    renderer.render_frame(&mut test.scene, &frame);

    let program = renderer.programs().get(forward);
    assert!(program.is_linked());
    assert_ne!(program.handle(), shipped);
    assert_eq!(program.inputs().len(), 1);

    let draws = common::draws_in(renderer.device().draws(), "Forward Pass");
    assert_eq!(draws.len(), 2);
    for draw in draws {
        assert_eq!(draw.program, Some(program.handle()));
        assert!(draw.program_linked);
    }

    // both blur programs share one file
    rewrite(&dir.join("blur.glsl"), POSITION_ONLY_SHADER);
    assert_eq!(renderer.hot_reload(), 2);
    assert_eq!(renderer.hot_reload(), 0);
}

#[test]
fn test_config_file_enables_hot_reload() {
    let dir = temp_dir("config");
    let path = dir.join("renderer.toml");
    std::fs::write(
        &path,
        r#"
mode = "forward"
hot_reload = true
bloom_iterations = 4

[shaders]
forward = "custom_forward.glsl"
"#,
    )
    .unwrap();

    let config = RendererConfig::load(&path).unwrap();
    assert_eq!(config.mode, PipelineMode::Forward);
    assert!(config.hot_reload);
    assert_eq!(config.bloom_iterations, 4);
    assert_eq!(
        config.shader_path(&config.shaders.forward),
        config.shader_dir.join("custom_forward.glsl")
    );
    assert_eq!(config.shaders.blur, Path::new("blur.glsl"));
}
