//! Camera

use glam::{Mat4, Vec3};

/// Look-at camera with a perspective projection.
///
/// The aspect ratio comes from the display size at pack time, so resizing the
/// renderer never touches the camera. The clip planes double as the `near` and
/// `far` values of the deferred Global block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO)
    }
}

impl Camera {
    /// 60 degree camera with clip planes at 0.1 and 1000
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            fov_y: 60.0_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn with_fov_degrees(mut self, degrees: f32) -> Self {
        self.fov_y = degrees.to_radians();
        self
    }

    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// GL-style projection with a [-1, 1] depth range, which the lighting
    /// shader assumes when it linearizes depth.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y, aspect, self.near, self.far)
    }

    /// Projection times view for a `width` x `height` display
    pub fn view_projection(&self, (width, height): (u32, u32)) -> Mat4 {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        self.projection_matrix(aspect) * self.view_matrix()
    }
}
