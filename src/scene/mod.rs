//! Scene management
//!
//! A [`Scene`] owns every object the pipeline draws. Objects are a tagged
//! union over [`ObjectKind`] sharing a name, transform, active flag and the
//! parameter range assigned to them while a frame is packed. Ids stay valid
//! when other objects are removed.

mod camera;
mod light;
mod transform;

pub use camera::*;
pub use light::*;
pub use transform::*;

use slotmap::SlotMap;

use crate::backend::GraphicsDevice;
use crate::resources::{Model, TextureId};

slotmap::new_key_type! {
    /// Stable identity of a scene object
    pub struct ObjectId;
}

/// Byte range of an object's parameters in a uniform buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamRange {
    pub offset: u32,
    pub size: u32,
}

/// Flat textured quad, drawn with the renderer's shared quad mesh
#[derive(Debug, Clone, Default)]
pub struct ScreenQuad {
    pub texture: Option<TextureId>,
}

#[derive(Debug)]
pub enum ObjectKind {
    Model(Model),
    Light(Light),
    Quad(ScreenQuad),
}

#[derive(Debug)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub active: bool,
    /// Local parameters written for the current frame
    pub params: ParamRange,
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn new(name: &str, kind: ObjectKind) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            active: true,
            params: ParamRange::default(),
            kind,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn light(&self) -> Option<&Light> {
        match &self.kind {
            ObjectKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            ObjectKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Whether the object gets local parameters and draw calls
    pub fn is_drawable(&self) -> bool {
        !matches!(self.kind, ObjectKind::Light(_))
    }

    /// Release device resources held by the object
    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        if let ObjectKind::Model(model) = self.kind {
            model.destroy(device);
        }
    }
}

/// Everything the pipeline draws
#[derive(Debug, Default)]
pub struct Scene {
    objects: SlotMap<ObjectId, SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        self.objects.insert(object)
    }

    pub fn add_model(&mut self, model: Model, transform: Transform) -> ObjectId {
        let name = model.name.clone();
        self.add(SceneObject::new(&name, ObjectKind::Model(model)).with_transform(transform))
    }

    pub fn add_quad(&mut self, name: &str, texture: Option<TextureId>, transform: Transform) -> ObjectId {
        self.add(SceneObject::new(name, ObjectKind::Quad(ScreenQuad { texture })).with_transform(transform))
    }

    /// Add a light placed at `transform.position`
    pub fn add_light(&mut self, name: &str, light: Light, transform: Transform) -> ObjectId {
        self.add(SceneObject::new(name, ObjectKind::Light(light)).with_transform(transform))
    }

    pub fn add_directional_light(&mut self, color: glam::Vec3, direction: glam::Vec3) -> ObjectId {
        self.add_light("Directional Light", Light::directional(color, direction), Transform::default())
    }

    pub fn add_point_light(&mut self, color: glam::Vec3, position: glam::Vec3) -> ObjectId {
        self.add_light("Point Light", Light::point(color), Transform::from_position(position))
    }

    pub fn add_spot_light(
        &mut self,
        color: glam::Vec3,
        position: glam::Vec3,
        direction: glam::Vec3,
        cutoff: f32,
    ) -> ObjectId {
        self.add_light(
            "Spot Light",
            Light::spot(color, direction, cutoff),
            Transform::from_position(position),
        )
    }

    /// Take an object out of the scene. The caller owns its device resources.
    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.objects.remove(id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut SceneObject)> {
        self.objects.iter_mut()
    }

    /// Every light object, active or not, in scene order
    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.objects.values().filter_map(SceneObject::light)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Remove every object and release its device resources
    pub fn clear<D: GraphicsDevice>(&mut self, device: &mut D) {
        for (_, object) in self.objects.drain() {
            object.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_remove_keeps_other_ids() {
        let mut scene = Scene::new();
        let a = scene.add_point_light(Vec3::ONE, Vec3::ZERO);
        let b = scene.add_quad("quad", None, Transform::default());
        let c = scene.add_directional_light(Vec3::ONE, -Vec3::Y);

        let removed = scene.remove(b).unwrap();
        assert_eq!(removed.name, "quad");
        assert!(scene.get(b).is_none());
        assert!(scene.remove(b).is_none());
        assert_eq!(scene.get(a).unwrap().name, "Point Light");
        assert_eq!(scene.get(c).unwrap().name, "Directional Light");

        let d = scene.add_quad("other", None, Transform::default());
        assert_ne!(d, b);
        assert!(scene.get(b).is_none());
    }

    #[test]
    fn test_lights_and_drawables() {
        let mut scene = Scene::new();
        let spot = scene.add_spot_light(Vec3::ONE, Vec3::Y, -Vec3::Y, 15.0);
        scene.add_quad("quad", None, Transform::default());
        assert_eq!(scene.get(spot).unwrap().transform.position, Vec3::Y);

        assert_eq!(scene.lights().count(), 1);
        assert_eq!(scene.iter().filter(|(_, object)| object.is_drawable()).count(), 1);
        assert_eq!(scene.len(), 2);
    }
}
