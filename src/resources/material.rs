//! Material definitions
//!
//! A material is a set of optional texture channels plus a few constant
//! factors. Only the albedo channel is sampled by the shipped passes; the
//! others are carried for shaders that want them.

use glam::Vec3;

use super::TextureId;

/// Texture channel of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialChannel {
    Albedo,
    Emissive,
    Specular,
    Normals,
    Bump,
}

impl MaterialChannel {
    pub const ALL: [MaterialChannel; 5] = [
        MaterialChannel::Albedo,
        MaterialChannel::Emissive,
        MaterialChannel::Specular,
        MaterialChannel::Normals,
        MaterialChannel::Bump,
    ];
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub albedo: Vec3,
    pub emissive: Vec3,
    pub smoothness: f32,

    albedo_texture: Option<TextureId>,
    emissive_texture: Option<TextureId>,
    specular_texture: Option<TextureId>,
    normals_texture: Option<TextureId>,
    bump_texture: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            albedo: Vec3::ONE,
            emissive: Vec3::ZERO,
            smoothness: 0.5,
            albedo_texture: None,
            emissive_texture: None,
            specular_texture: None,
            normals_texture: None,
            bump_texture: None,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_albedo(mut self, albedo: Vec3) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn with_texture(mut self, channel: MaterialChannel, texture: TextureId) -> Self {
        self.set_texture(channel, Some(texture));
        self
    }

    pub fn set_texture(&mut self, channel: MaterialChannel, texture: Option<TextureId>) {
        *self.slot_mut(channel) = texture;
    }

    /// Texture bound to a channel, if any
    pub fn texture(&self, channel: MaterialChannel) -> Option<TextureId> {
        match channel {
            MaterialChannel::Albedo => self.albedo_texture,
            MaterialChannel::Emissive => self.emissive_texture,
            MaterialChannel::Specular => self.specular_texture,
            MaterialChannel::Normals => self.normals_texture,
            MaterialChannel::Bump => self.bump_texture,
        }
    }

    /// Channels that have a texture
    pub fn textured_channels(&self) -> impl Iterator<Item = MaterialChannel> + '_ {
        MaterialChannel::ALL
            .into_iter()
            .filter(|channel| self.texture(*channel).is_some())
    }

    fn slot_mut(&mut self, channel: MaterialChannel) -> &mut Option<TextureId> {
        match channel {
            MaterialChannel::Albedo => &mut self.albedo_texture,
            MaterialChannel::Emissive => &mut self.emissive_texture,
            MaterialChannel::Specular => &mut self.specular_texture,
            MaterialChannel::Normals => &mut self.normals_texture,
            MaterialChannel::Bump => &mut self.bump_texture,
        }
    }
}
