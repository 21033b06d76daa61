//! Shared fixtures for the integration tests.
//!
//! Every test runs against the headless device, so no GPU or window is
//! required.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use deferred_renderer::backend::headless::{DrawCall, HeadlessDevice};
use deferred_renderer::resources::Mesh;
use deferred_renderer::scene::{ObjectId, Scene, Transform};
use deferred_renderer::{Renderer, RendererConfig};
use glam::Vec3;

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;

/// Shader sources shipped with the crate
pub fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders")
}

pub fn test_config() -> RendererConfig {
    RendererConfig::default()
        .with_shader_dir(shader_dir())
        .with_size(WIDTH, HEIGHT)
}

pub fn headless_renderer() -> Renderer<HeadlessDevice> {
    deferred_renderer::init_logging("warn");
    Renderer::new(HeadlessDevice::new(), test_config()).unwrap()
}

/// Two single-mesh models and one spot light
pub struct TestScene {
    pub scene: Scene,
    pub cube: ObjectId,
    pub sphere: ObjectId,
    pub light: ObjectId,
}

pub fn two_meshes_and_spot(renderer: &mut Renderer<HeadlessDevice>) -> TestScene {
    let mut scene = Scene::new();

    let cube = renderer.upload_model("cube", vec![Mesh::cube()], Vec::new()).unwrap();
    let cube = scene.add_model(cube, Transform::from_position(Vec3::new(-1.5, 0.0, 0.0)));

    let sphere = renderer
        .upload_model("sphere", vec![Mesh::sphere(16, 8)], Vec::new())
        .unwrap();
    let sphere = scene.add_model(sphere, Transform::from_position(Vec3::new(1.5, 0.0, 0.0)));

    let light = scene.add_spot_light(Vec3::ONE, Vec3::new(0.0, 5.0, 0.0), -Vec3::Y, 25.0);

    TestScene {
        scene,
        cube,
        sphere,
        light,
    }
}

/// Draws recorded inside the debug group `group`
pub fn draws_in<'a>(draws: &'a [DrawCall], group: &str) -> Vec<&'a DrawCall> {
    draws
        .iter()
        .filter(|draw| draw.debug_group.as_deref() == Some(group))
        .collect()
}

/// Fresh, empty directory under the system temp dir
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "deferred-renderer-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Push a file's modification time `seconds` past its current value
pub fn touch(path: &Path, seconds: u64) {
    let current = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::now());
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(current + Duration::from_secs(seconds))
        .unwrap();
}

/// Write `source` to `path` and move its timestamp forward, so the change is
/// visible even on file systems with coarse timestamps
pub fn rewrite(path: &Path, source: &str) {
    std::fs::write(path, source).unwrap();
    touch(path, 10);
}

/// Minimal program reading only a position
pub const POSITION_ONLY_SHADER: &str = r#"
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
void main()
{
    gl_Position = vec4(aPosition, 1.0);
}
#endif

#ifdef FRAGMENT
layout(location = 0) out vec4 oColor;
void main()
{
    oColor = vec4(1.0);
}
#endif
"#;

/// Position plus normal
pub const POSITION_NORMAL_SHADER: &str = r#"
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
layout(location = 1) in vec3 aNormal;
void main()
{
    gl_Position = vec4(aPosition + aNormal * 0.01, 1.0);
}
#endif

#ifdef FRAGMENT
layout(location = 0) out vec4 oColor;
void main()
{
    oColor = vec4(1.0);
}
#endif
"#;

pub const BROKEN_SHADER: &str = r#"
#ifdef VERTEX
void main()
{
    this is not glsl
}
#endif
"#;
