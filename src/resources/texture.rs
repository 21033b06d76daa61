//! Texture loading and management

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::backend::{DeviceResult, GraphicsDevice, TextureDescriptor, TextureFormat, TextureHandle};

/// Stable index of a texture in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(usize);

/// Decoded pixel data ready for upload
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|e| e.to_string())?;
        Ok(Self::from_image(img, &name))
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        Ok(Self::from_image(img, name))
    }

    /// Rows are flipped so the first row is the bottom of the image, and
    /// images without alpha stay three-channel.
    fn from_image(img: DynamicImage, name: &str) -> Self {
        let img = img.flipv();
        let (width, height) = img.dimensions();
        let (format, data) = if img.color().has_alpha() {
            (TextureFormat::Rgba8, img.to_rgba8().into_raw())
        } else {
            (TextureFormat::Rgb8, img.to_rgb8().into_raw())
        };

        Self {
            width,
            height,
            format,
            data,
            name: name.to_string(),
        }
    }

    /// Create a 1x1 texture of a single color
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Create a checkerboard texture with 8x8 cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                data.extend_from_slice(if is_even { &color1 } else { &color2 });
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8,
            data,
            name: "checkerboard".to_string(),
        }
    }
}

/// An uploaded texture
#[derive(Debug)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Source path, or the name of a generated texture
    pub source: String,
}

/// Textures shared by materials and screen quads, deduplicated by source path
#[derive(Debug, Default)]
pub struct TextureRegistry {
    textures: Vec<Texture>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an image file, reusing the texture if the same path was loaded
    /// before. Failures are logged and yield `None`.
    pub fn load<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        path: impl AsRef<Path>,
    ) -> Option<TextureId> {
        let path = path.as_ref();
        let source = path.to_string_lossy().into_owned();
        if let Some(id) = self.find(&source) {
            return Some(id);
        }

        let data = match TextureData::from_file(path) {
            Ok(data) => data,
            Err(err) => {
                log::error!("Failed to load texture {source}: {err}");
                return None;
            }
        };
        match self.upload(device, &data, source.clone()) {
            Ok(id) => Some(id),
            Err(err) => {
                log::error!("Failed to upload texture {source}: {err}");
                None
            }
        }
    }

    /// Upload already decoded pixels under `data.name`.
    pub fn insert<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        data: &TextureData,
    ) -> DeviceResult<TextureId> {
        if let Some(id) = self.find(&data.name) {
            return Ok(id);
        }
        self.upload(device, data, data.name.clone())
    }

    pub fn find(&self, source: &str) -> Option<TextureId> {
        self.textures
            .iter()
            .position(|texture| texture.source == source)
            .map(TextureId)
    }

    pub fn get(&self, id: TextureId) -> &Texture {
        &self.textures[id.0]
    }

    pub fn handle(&self, id: TextureId) -> TextureHandle {
        self.textures[id.0].handle
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        for texture in self.textures {
            device.delete_texture(texture.handle);
        }
    }

    fn upload<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        data: &TextureData,
        source: String,
    ) -> DeviceResult<TextureId> {
        let desc = TextureDescriptor::sampled(&data.name, data.format, data.width, data.height);
        let handle = device.create_texture(&desc, Some(&data.data))?;
        log::debug!(
            "Loaded texture {} ({}x{} {:?})",
            source,
            data.width,
            data.height,
            data.format
        );

        self.textures.push(Texture {
            handle,
            width: data.width,
            height: data.height,
            format: data.format,
            source,
        });
        Ok(TextureId(self.textures.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessDevice;

    #[test]
    fn test_insert_deduplicates_by_name() {
        let mut device = HeadlessDevice::new();
        let mut registry = TextureRegistry::new();

        let white = TextureData::solid_color([255; 4], "white");
        let first = registry.insert(&mut device, &white).unwrap();
        let second = registry.insert(&mut device, &white).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let mut device = HeadlessDevice::new();
        let mut registry = TextureRegistry::new();

        assert!(registry.load(&mut device, "/nonexistent/albedo.png").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_checkerboard_size() {
        let checker = TextureData::checkerboard(16, [0; 4], [255; 4]);
        assert_eq!(checker.data.len(), 16 * 16 * 4);
        assert_eq!(&checker.data[..4], &[0; 4]);
        assert_eq!(&checker.data[8 * 4..9 * 4], &[255; 4]);
    }
}
