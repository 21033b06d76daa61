//! Light types for the scene

use glam::Vec3;

/// Light kind, stored as the `kind` tag of a packed light record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

impl LightKind {
    pub fn tag(&self) -> u32 {
        *self as u32
    }
}

/// A light source
///
/// A light is placed by the transform of the scene object holding it.
/// Directional lights ignore that position, point lights ignore `direction`,
/// spot lights use both plus a cone given by `cutoff` and `softness`
/// (degrees). The cone is fully lit inside `cutoff` and fades to black at
/// `cutoff + softness`.
#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    direction: Vec3,
    pub intensity: f32,
    pub cutoff: f32,
    pub softness: f32,
    pub active: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: Vec3::ONE,
            direction: -Vec3::Y,
            intensity: 1.0,
            cutoff: 12.5,
            softness: 5.0,
            active: true,
        }
    }
}

impl Light {
    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        let mut light = Self {
            kind: LightKind::Directional,
            color,
            ..Default::default()
        };
        light.set_direction(direction);
        light
    }

    pub fn point(color: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            ..Default::default()
        }
    }

    pub fn spot(color: Vec3, direction: Vec3, cutoff: f32) -> Self {
        let mut light = Self {
            kind: LightKind::Spot,
            color,
            cutoff,
            ..Default::default()
        };
        light.set_direction(direction);
        light
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Unit vector the light points along
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Store `direction` normalized. A zero or non-finite vector leaves the
    /// direction unchanged, straight down for a new light.
    pub fn set_direction(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize() {
            self.direction = direction;
        } else {
            log::warn!("Ignoring degenerate light direction {direction}");
        }
    }

    /// Cosine of the inner cone angle
    pub fn cos_cutoff(&self) -> f32 {
        self.cutoff.to_radians().cos()
    }

    /// Cosine of the outer cone angle
    pub fn cos_outer_cutoff(&self) -> f32 {
        (self.cutoff + self.softness).to_radians().cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_is_normalized() {
        let light = Light::directional(Vec3::ONE, Vec3::new(0.0, -4.0, 0.0));
        assert_eq!(light.direction(), -Vec3::Y);

        let mut spot = Light::spot(Vec3::ONE, Vec3::X * 3.0, 20.0);
        spot.set_direction(Vec3::ZERO);
        assert_eq!(spot.direction(), Vec3::X);
    }

    #[test]
    fn test_degenerate_direction_falls_back_to_down() {
        let directional = Light::directional(Vec3::ONE, Vec3::ZERO);
        assert_eq!(directional.direction(), -Vec3::Y);

        let spot = Light::spot(Vec3::ONE, Vec3::new(f32::NAN, 0.0, 0.0), 20.0);
        assert_eq!(spot.direction(), -Vec3::Y);
        assert!(spot.direction().is_finite());
    }

    #[test]
    fn test_spot_cone_cosines() {
        let mut spot = Light::spot(Vec3::ONE, -Vec3::Y, 30.0);
        spot.softness = 30.0;
        assert!((spot.cos_cutoff() - 30f32.to_radians().cos()).abs() < 1e-6);
        assert!(spot.cos_outer_cutoff().abs() < 1e-6);
        assert!(spot.cos_outer_cutoff() < spot.cos_cutoff());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(LightKind::Directional.tag(), 0);
        assert_eq!(LightKind::Point.tag(), 1);
        assert_eq!(LightKind::Spot.tag(), 2);
    }
}
