//! Render-target sets
//!
//! A [`RenderTargetSet`] is one framebuffer object with its color attachments
//! and an optional depth-stencil attachment, all sized to the display. The
//! pipeline uses three kinds:
//! - Geometry buffer: specular, normals, position, albedo + depth
//! - Lighting buffer: final, specular, normals, position, albedo, bloom + depth
//! - Blur buffers: a ping-pong pair of single-color sets without depth
//!
//! Completeness is checked when a set is assembled. An incomplete set is kept
//! and logged rather than reported as an error: drawing into it yields black
//! output, which is how the renderer surfaces broken targets.

use crate::backend::{
    Attachment, DeviceResult, FramebufferHandle, GraphicsDevice, TextureDescriptor, TextureFormat,
    TextureHandle,
};

/// Role of a color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Final,
    Specular,
    Normals,
    Position,
    Albedo,
    Bloom,
}

impl AttachmentKind {
    pub fn label(&self) -> &'static str {
        match self {
            AttachmentKind::Final => "final",
            AttachmentKind::Specular => "specular",
            AttachmentKind::Normals => "normals",
            AttachmentKind::Position => "position",
            AttachmentKind::Albedo => "albedo",
            AttachmentKind::Bloom => "bloom",
        }
    }
}

/// Color outputs of the geometry pass, in draw-buffer order
pub const GEOMETRY_ATTACHMENTS: [AttachmentKind; 4] = [
    AttachmentKind::Specular,
    AttachmentKind::Normals,
    AttachmentKind::Position,
    AttachmentKind::Albedo,
];

/// Color outputs of the lighting and forward passes, in draw-buffer order
pub const LIGHTING_ATTACHMENTS: [AttachmentKind; 6] = [
    AttachmentKind::Final,
    AttachmentKind::Specular,
    AttachmentKind::Normals,
    AttachmentKind::Position,
    AttachmentKind::Albedo,
    AttachmentKind::Bloom,
];

/// A framebuffer and the attachments it owns
#[derive(Debug)]
pub struct RenderTargetSet {
    label: String,
    handle: FramebufferHandle,
    colors: Vec<(AttachmentKind, TextureHandle)>,
    depth: Option<TextureHandle>,
    width: u32,
    height: u32,
    complete: bool,
}

impl RenderTargetSet {
    /// Allocate a 2D image suitable as an attachment: nearest filtering, edge
    /// clamping, no mipmaps.
    pub fn create_attachment<D: GraphicsDevice>(
        device: &mut D,
        label: &str,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> DeviceResult<TextureHandle> {
        device.create_texture(
            &TextureDescriptor::render_target(label, format, width, height),
            None,
        )
    }

    /// Create one RGBA8 attachment per entry of `colors` (bound to draw
    /// buffers in that order) plus an optional depth-stencil attachment, then
    /// validate the framebuffer.
    pub fn assemble<D: GraphicsDevice>(
        device: &mut D,
        label: &str,
        colors: &[AttachmentKind],
        with_depth: bool,
        width: u32,
        height: u32,
    ) -> DeviceResult<Self> {
        let handle = device.create_framebuffer()?;

        let mut attachments = Vec::with_capacity(colors.len());
        for (index, kind) in colors.iter().enumerate() {
            let texture = Self::create_attachment(
                device,
                &format!("{label}_{}", kind.label()),
                TextureFormat::Rgba8,
                width,
                height,
            )?;
            device.attach_texture(handle, Attachment::Color(index as u32), texture);
            attachments.push((*kind, texture));
        }

        let depth = if with_depth {
            let texture = Self::create_attachment(
                device,
                &format!("{label}_depth"),
                TextureFormat::Depth24Stencil8,
                width,
                height,
            )?;
            device.attach_texture(handle, Attachment::DepthStencil, texture);
            Some(texture)
        } else {
            None
        };

        device.set_draw_buffers(handle, colors.len() as u32);
        let status = device.framebuffer_status(handle);
        if status.is_complete() {
            log::debug!(
                "Assembled render targets '{}' ({}x{}, {} color, depth: {})",
                label,
                width,
                height,
                colors.len(),
                with_depth
            );
        } else {
            log::error!("Render targets '{label}' are incomplete: {status}");
        }

        Ok(Self {
            label: label.to_string(),
            handle,
            colors: attachments,
            depth,
            width,
            height,
            complete: status.is_complete(),
        })
    }

    /// Geometry buffer of the deferred pipeline
    pub fn geometry<D: GraphicsDevice>(device: &mut D, width: u32, height: u32) -> DeviceResult<Self> {
        Self::assemble(device, "geometry", &GEOMETRY_ATTACHMENTS, true, width, height)
    }

    /// Output of the lighting pass (deferred) or the forward pass
    pub fn lighting<D: GraphicsDevice>(device: &mut D, width: u32, height: u32) -> DeviceResult<Self> {
        Self::assemble(device, "lighting", &LIGHTING_ATTACHMENTS, true, width, height)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn handle(&self) -> FramebufferHandle {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the framebuffer passed validation
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn attachment(&self, kind: AttachmentKind) -> Option<TextureHandle> {
        self.colors
            .iter()
            .find(|(attached, _)| *attached == kind)
            .map(|(_, texture)| *texture)
    }

    pub fn color_attachments(&self) -> &[(AttachmentKind, TextureHandle)] {
        &self.colors
    }

    pub fn depth(&self) -> Option<TextureHandle> {
        self.depth
    }

    /// Bind for drawing and set the viewport to the set's size
    pub fn bind<D: GraphicsDevice>(&self, device: &mut D) {
        device.bind_framebuffer(Some(self.handle));
        device.set_viewport(self.width, self.height);
    }

    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        device.delete_framebuffer(self.handle);
        for (_, texture) in self.colors {
            device.delete_texture(texture);
        }
        if let Some(depth) = self.depth {
            device.delete_texture(depth);
        }
    }
}

/// Ping-pong pair used by the separable blur
#[derive(Debug)]
pub struct BlurBuffers {
    targets: [RenderTargetSet; 2],
}

impl BlurBuffers {
    pub fn new<D: GraphicsDevice>(device: &mut D, width: u32, height: u32) -> DeviceResult<Self> {
        let first = RenderTargetSet::assemble(device, "blur_0", &[AttachmentKind::Bloom], false, width, height)?;
        let second = RenderTargetSet::assemble(device, "blur_1", &[AttachmentKind::Bloom], false, width, height)?;
        Ok(Self {
            targets: [first, second],
        })
    }

    /// # Panics
    ///
    /// Panics if `index` is not 0 or 1.
    pub fn get(&self, index: usize) -> &RenderTargetSet {
        &self.targets[index]
    }

    /// Color image of one side of the pair
    pub fn texture(&self, index: usize) -> Option<TextureHandle> {
        self.targets[index].attachment(AttachmentKind::Bloom)
    }

    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        for target in self.targets {
            target.destroy(device);
        }
    }
}

/// Every display-sized target the pipeline renders into
#[derive(Debug)]
pub struct RenderTargets {
    pub geometry: RenderTargetSet,
    pub lighting: RenderTargetSet,
    pub blur: BlurBuffers,
}

impl RenderTargets {
    pub fn new<D: GraphicsDevice>(device: &mut D, width: u32, height: u32) -> DeviceResult<Self> {
        Ok(Self {
            geometry: RenderTargetSet::geometry(device, width, height)?,
            lighting: RenderTargetSet::lighting(device, width, height)?,
            blur: BlurBuffers::new(device, width, height)?,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.lighting.size()
    }

    /// Recreate every target at the new size. The old targets are released
    /// only once the new ones exist.
    pub fn resize<D: GraphicsDevice>(&mut self, device: &mut D, width: u32, height: u32) -> DeviceResult<()> {
        let resized = Self::new(device, width, height)?;
        std::mem::replace(self, resized).destroy(device);
        Ok(())
    }

    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        self.geometry.destroy(device);
        self.lighting.destroy(device);
        self.blur.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessDevice;

    #[test]
    fn test_geometry_buffer_layout() {
        let mut device = HeadlessDevice::new();
        let geometry = RenderTargetSet::geometry(&mut device, 64, 32).unwrap();

        assert!(geometry.is_complete());
        assert_eq!(geometry.color_attachments().len(), 4);
        assert!(geometry.depth().is_some());
        assert!(geometry.attachment(AttachmentKind::Final).is_none());

        let albedo = geometry.attachment(AttachmentKind::Albedo).unwrap();
        let desc = device.texture_descriptor(albedo).unwrap();
        assert_eq!((desc.width, desc.height), (64, 32));
        assert!(!desc.mipmaps);
    }

    #[test]
    fn test_blur_pair_has_no_depth() {
        let mut device = HeadlessDevice::new();
        let blur = BlurBuffers::new(&mut device, 16, 16).unwrap();

        for index in 0..2 {
            assert!(blur.get(index).is_complete());
            assert!(blur.get(index).depth().is_none());
        }
        assert_ne!(blur.texture(0), blur.texture(1));
    }

    #[test]
    fn test_resize_releases_old_images() {
        let mut device = HeadlessDevice::new();
        let mut targets = RenderTargets::new(&mut device, 32, 32).unwrap();
        // 4 + 1 geometry, 6 + 1 lighting, 2 blur
        assert_eq!(device.live_textures(), 14);

        targets.resize(&mut device, 48, 24).unwrap();
        assert_eq!(device.live_textures(), 14);
        assert_eq!(targets.size(), (48, 24));
        assert_eq!(targets.geometry.size(), (48, 24));
    }
}
