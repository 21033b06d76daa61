//! Frame parameter packing
//!
//! Parameters reach the shaders through two std140 uniform blocks:
//! - Global (binding 0): camera, ambient, post-process controls and the light
//!   list. The fields present depend on the pipeline mode, see
//!   [`GlobalLayout`].
//! - Local (binding 1): one `mat4 world, mat4 worldViewProjection` record per
//!   drawable object, each starting at the device's uniform offset alignment.
//!
//! Offsets written here are a silent contract with the blocks declared in
//! `shaders/`. Nothing checks them at run time.

use glam::{Mat4, Vec3};

use crate::resources::{align, BufferWriter};
use crate::scene::{Light, ParamRange, Scene};

/// Binding point of the Global block
pub const GLOBAL_BINDING: u32 = 0;
/// Binding point of the Local block
pub const LOCAL_BINDING: u32 = 1;

/// Bytes of one packed light record
pub const LIGHT_RECORD_SIZE: u32 = 80;
/// Bytes of one Local record
pub const LOCAL_RECORD_SIZE: u32 = 128;

/// Field set of the Global block for one pipeline mode
///
/// Field order is `cameraPosition, ambient, [near, far], bloomThreshold,
/// [blackWhite], lightCount, lights[]`, where bracketed fields are present only
/// when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalLayout {
    pub depth_range: bool,
    pub black_white: bool,
    /// Length of the light array declared by the shaders
    pub max_lights: u32,
}

impl GlobalLayout {
    pub const DEFAULT_MAX_LIGHTS: u32 = 16;

    /// Layout read by the forward program
    pub fn forward() -> Self {
        Self {
            depth_range: false,
            black_white: false,
            max_lights: Self::DEFAULT_MAX_LIGHTS,
        }
    }

    /// Layout read by the deferred lighting program
    pub fn deferred() -> Self {
        Self {
            depth_range: true,
            black_white: true,
            max_lights: Self::DEFAULT_MAX_LIGHTS,
        }
    }

    pub fn with_max_lights(mut self, max_lights: u32) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Byte offset of `lightCount` relative to the block start
    pub fn light_count_offset(&self) -> u32 {
        let mut offset = 16;
        if self.depth_range {
            offset += 8;
        }
        offset += 4;
        if self.black_white {
            offset += 4;
        }
        offset
    }

    /// Byte offset of the first light record relative to the block start
    pub fn lights_offset(&self) -> u32 {
        crate::resources::align(self.light_count_offset() + 4, 16)
    }

    /// Size of the block as declared by the shaders, with every light slot
    pub fn block_size(&self) -> u32 {
        self.lights_offset() + self.max_lights * LIGHT_RECORD_SIZE
    }
}

/// Values of the Global block for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalParams {
    pub camera_position: Vec3,
    pub ambient: f32,
    pub near: f32,
    pub far: f32,
    pub bloom_threshold: f32,
    pub black_white: bool,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            camera_position: Vec3::ZERO,
            ambient: 0.1,
            near: 0.1,
            far: 100.0,
            bloom_threshold: 1.0,
            black_white: false,
        }
    }
}

/// Write the Global block for every light in `scene` and return its range.
///
/// The block starts 16-byte aligned. Its size is the bytes actually written,
/// which covers the header plus one record per packed light. Lights beyond
/// `layout.max_lights` or beyond the writer's capacity are dropped with a
/// warning. A writer too small for the header gets an empty range.
pub fn pack_global(
    writer: &mut BufferWriter<'_>,
    layout: &GlobalLayout,
    params: &GlobalParams,
    scene: &Scene,
) -> ParamRange {
    let lights: Vec<(&Light, Vec3, bool)> = scene
        .iter()
        .filter_map(|(_, object)| {
            object
                .light()
                .map(|light| (light, object.transform.position, object.active))
        })
        .collect();
    let start = align(writer.head(), 16);
    let Some(room) = writer.capacity().checked_sub(start + layout.lights_offset()) else {
        log::error!(
            "Uniform buffer of {} bytes cannot hold the Global block at offset {}",
            writer.capacity(),
            start
        );
        return ParamRange {
            offset: start,
            size: 0,
        };
    };

    let fitting = (room / LIGHT_RECORD_SIZE) as usize;
    let count = lights.len().min(layout.max_lights as usize).min(fitting);
    if count < lights.len() {
        log::warn!(
            "Scene has {} lights, only the first {} are packed (shader limit {}, room for {})",
            lights.len(),
            count,
            layout.max_lights,
            fitting
        );
    }

    writer.align_head(16);
    writer.push_vec3(params.camera_position);
    writer.push_f32(params.ambient);
    if layout.depth_range {
        writer.push_f32(params.near);
        writer.push_f32(params.far);
    }
    writer.push_f32(params.bloom_threshold);
    if layout.black_white {
        writer.push_u32(params.black_white as u32);
    }
    writer.push_u32(count as u32);

    for (light, position, object_active) in lights.into_iter().take(count) {
        pack_light(writer, light, position, object_active, params.bloom_threshold);
    }

    ParamRange {
        offset: start,
        size: writer.head() - start,
    }
}

fn pack_light(
    writer: &mut BufferWriter<'_>,
    light: &Light,
    position: Vec3,
    object_active: bool,
    bloom_threshold: f32,
) {
    writer.write_aligned(&light.kind.tag().to_ne_bytes(), 16);
    writer.push_vec3(light.color);
    writer.push_vec3(light.direction());
    writer.push_vec3(position);
    writer.push_f32(light.cos_cutoff());
    writer.push_f32(light.cos_outer_cutoff());
    writer.push_f32(light.intensity);
    writer.push_u32((light.active && object_active) as u32);
    writer.push_f32(bloom_threshold);
}

/// Write one Local record per drawable object and store its range on the
/// object. Returns how many records were written.
///
/// Objects whose record no longer fits get an empty range and are skipped by
/// the passes for this frame.
pub fn pack_locals(
    writer: &mut BufferWriter<'_>,
    scene: &mut Scene,
    view_projection: &Mat4,
    alignment: u32,
) -> usize {
    let mut written = 0;
    let mut dropped = 0;
    for (_, object) in scene.iter_mut() {
        if !object.is_drawable() {
            continue;
        }
        if !writer.fits(LOCAL_RECORD_SIZE, alignment) {
            object.params = ParamRange::default();
            dropped += 1;
            continue;
        }
        let world = object.transform.matrix();
        let offset = writer.align_head(alignment);
        writer.push_mat4(&world);
        writer.push_mat4(&(*view_projection * world));
        object.params = ParamRange {
            offset,
            size: LOCAL_RECORD_SIZE,
        };
        written += 1;
    }
    if dropped > 0 {
        log::warn!(
            "Uniform buffer of {} bytes is full, {} objects are not drawn this frame",
            writer.capacity(),
            dropped
        );
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Transform;
    use rstest::rstest;

    fn read_u32(bytes: &[u8], offset: u32) -> u32 {
        bytemuck::pod_read_unaligned(&bytes[offset as usize..offset as usize + 4])
    }

    fn read_f32(bytes: &[u8], offset: u32) -> f32 {
        bytemuck::pod_read_unaligned(&bytes[offset as usize..offset as usize + 4])
    }

    fn lit_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_directional_light(Vec3::ONE, -Vec3::Y);
        scene.add_point_light(Vec3::X, Vec3::new(1.0, 2.0, 3.0));
        scene.add_point_light(Vec3::Y, Vec3::new(-1.0, 2.0, 3.0));
        scene
    }

    #[rstest]
    #[case(GlobalLayout::forward(), 20, 32)]
    #[case(GlobalLayout::deferred(), 32, 48)]
    fn test_layout_offsets(#[case] layout: GlobalLayout, #[case] count: u32, #[case] lights: u32) {
        assert_eq!(layout.light_count_offset(), count);
        assert_eq!(layout.lights_offset(), lights);
        assert_eq!(layout.block_size(), lights + 16 * LIGHT_RECORD_SIZE);
    }

    #[rstest]
    #[case(GlobalLayout::forward())]
    #[case(GlobalLayout::deferred())]
    fn test_three_lights_pack_three_records(#[case] layout: GlobalLayout) {
        let scene = lit_scene();
        let mut bytes = vec![0u8; 4096];
        let mut writer = BufferWriter::new(&mut bytes);

        let range = pack_global(&mut writer, &layout, &GlobalParams::default(), &scene);
        drop(writer);

        assert_eq!(range.offset, 0);
        assert_eq!(read_u32(&bytes, layout.light_count_offset()), 3);
        assert_eq!(range.size, layout.lights_offset() + 3 * LIGHT_RECORD_SIZE);

        let starts: Vec<u32> = (0..3).map(|i| layout.lights_offset() + i * LIGHT_RECORD_SIZE).collect();
        for pair in starts.windows(2) {
            assert!(pair[0] + LIGHT_RECORD_SIZE <= pair[1]);
            assert_eq!(pair[1] % 16, 0);
        }
        // kind tags in scene order
        assert_eq!(read_u32(&bytes, starts[0]), 0);
        assert_eq!(read_u32(&bytes, starts[1]), 1);
        assert_eq!(read_u32(&bytes, starts[2]), 1);
    }

    #[test]
    fn test_light_record_fields() {
        let mut scene = Scene::new();
        let mut spot = Light::spot(Vec3::new(1.0, 0.5, 0.25), -Vec3::Z, 20.0).with_intensity(3.0);
        spot.softness = 10.0;
        let id = scene.add_light("spot", spot, Transform::default());
        // the object transform places the light
        let object = scene.get_mut(id).unwrap();
        object.transform.translate(Vec3::new(4.0, 5.0, 6.0));
        object.active = false;

        let layout = GlobalLayout::deferred();
        let params = GlobalParams {
            camera_position: Vec3::new(7.0, 8.0, 9.0),
            ambient: 0.25,
            near: 0.5,
            far: 50.0,
            bloom_threshold: 0.75,
            black_white: true,
        };
        let mut bytes = vec![0u8; 1024];
        let mut writer = BufferWriter::new(&mut bytes);
        pack_global(&mut writer, &layout, &params, &scene);
        drop(writer);

        assert_eq!(read_f32(&bytes, 0), 7.0);
        assert_eq!(read_f32(&bytes, 12), 0.25);
        assert_eq!(read_f32(&bytes, 16), 0.5);
        assert_eq!(read_f32(&bytes, 20), 50.0);
        assert_eq!(read_f32(&bytes, 24), 0.75);
        assert_eq!(read_u32(&bytes, 28), 1);

        let light = layout.lights_offset();
        assert_eq!(read_u32(&bytes, light), 2);
        assert_eq!(read_f32(&bytes, light + 16), 1.0);
        assert_eq!(read_f32(&bytes, light + 40), -1.0);
        assert_eq!(read_f32(&bytes, light + 48), 4.0);
        assert_eq!(read_f32(&bytes, light + 56), 6.0);
        assert!((read_f32(&bytes, light + 60) - 20f32.to_radians().cos()).abs() < 1e-6);
        assert!((read_f32(&bytes, light + 64) - 30f32.to_radians().cos()).abs() < 1e-6);
        assert_eq!(read_f32(&bytes, light + 68), 3.0);
        // inactive object
        assert_eq!(read_u32(&bytes, light + 72), 0);
        assert_eq!(read_f32(&bytes, light + 76), 0.75);
    }

    #[test]
    fn test_light_overflow_is_truncated() {
        let mut scene = Scene::new();
        for i in 0..5 {
            scene.add_point_light(Vec3::ONE, Vec3::splat(i as f32));
        }
        let layout = GlobalLayout::forward().with_max_lights(2);
        let mut bytes = vec![0u8; 1024];
        let mut writer = BufferWriter::new(&mut bytes);
        let range = pack_global(&mut writer, &layout, &GlobalParams::default(), &scene);
        drop(writer);

        assert_eq!(read_u32(&bytes, layout.light_count_offset()), 2);
        assert_eq!(range.size, layout.lights_offset() + 2 * LIGHT_RECORD_SIZE);
    }

    #[test]
    fn test_lights_stop_at_buffer_capacity() {
        let scene = lit_scene();
        let layout = GlobalLayout::forward();
        let mut bytes = vec![0u8; (layout.lights_offset() + 2 * LIGHT_RECORD_SIZE + 40) as usize];
        let mut writer = BufferWriter::new(&mut bytes);

        let range = pack_global(&mut writer, &layout, &GlobalParams::default(), &scene);
        drop(writer);

        assert_eq!(range.size, layout.lights_offset() + 2 * LIGHT_RECORD_SIZE);
        assert_eq!(read_u32(&bytes, layout.light_count_offset()), 2);
    }

    #[test]
    fn test_header_that_does_not_fit_packs_nothing() {
        let mut bytes = vec![0u8; 16];
        let mut writer = BufferWriter::new(&mut bytes);

        let range = pack_global(&mut writer, &GlobalLayout::deferred(), &GlobalParams::default(), &lit_scene());
        assert_eq!(range.size, 0);
        assert_eq!(writer.head(), 0);
    }

    #[test]
    fn test_locals_stop_at_buffer_capacity() {
        let mut scene = Scene::new();
        let ids: Vec<_> = (0..3)
            .map(|i| scene.add_quad("quad", None, Transform::from_position(Vec3::splat(i as f32))))
            .collect();
        // a range left over from an earlier frame
        scene.get_mut(ids[2]).unwrap().params = ParamRange { offset: 512, size: LOCAL_RECORD_SIZE };

        let mut bytes = vec![0u8; 600];
        let mut writer = BufferWriter::new(&mut bytes);
        let written = pack_locals(&mut writer, &mut scene, &Mat4::IDENTITY, 256);

        assert_eq!(written, 2);
        assert_eq!(writer.head(), 256 + LOCAL_RECORD_SIZE);
        assert_eq!(scene.get(ids[1]).unwrap().params.offset, 256);
        assert_eq!(scene.get(ids[2]).unwrap().params, ParamRange::default());
    }

    #[test]
    fn test_locals_are_aligned_and_recorded() {
        let mut scene = lit_scene();
        let a = scene.add_quad("a", None, Transform::from_position(Vec3::X));
        let b = scene.add_quad("b", None, Transform::from_position(Vec3::Y));
        let view_projection = Mat4::from_scale(Vec3::splat(2.0));

        let mut bytes = vec![0u8; 2048];
        let mut writer = BufferWriter::new(&mut bytes);
        writer.push_u32(1);
        let written = pack_locals(&mut writer, &mut scene, &view_projection, 256);
        drop(writer);

        assert_eq!(written, 2);
        let first = scene.get(a).unwrap().params;
        let second = scene.get(b).unwrap().params;
        assert_eq!(first, ParamRange { offset: 256, size: LOCAL_RECORD_SIZE });
        assert_eq!(second.offset, 512);

        // wvp translation column of the second object
        let wvp_offset = second.offset + 64;
        assert_eq!(read_f32(&bytes, wvp_offset + 48), 0.0);
        assert_eq!(read_f32(&bytes, wvp_offset + 52), 2.0);
    }
}
