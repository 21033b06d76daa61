//! Core device abstraction traits
//!
//! The pipeline talks to the GPU through an immediate-mode device: objects are
//! created up front, bound to the current state and drawn from. Both the OpenGL
//! device and the headless device implement this interface.

use crate::backend::types::*;
use thiserror::Error;

/// Device error type
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create framebuffer: {0}")]
    FramebufferCreationFailed(String),
    #[error("Failed to create vertex array: {0}")]
    VertexArrayCreationFailed(String),
    #[error("Failed to map buffer: {0}")]
    MapFailed(String),
    #[error("Write of {len} bytes at offset {offset} overflows buffer of {capacity} bytes")]
    OutOfBounds { offset: u32, len: usize, capacity: u32 },
    #[error("Unknown {0} handle")]
    InvalidHandle(&'static str),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

/// Handle to a linked (or failed) shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Handle to a vertex array object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayHandle(pub(crate) u64);

/// Outcome of building a program
///
/// A handle is always produced. When `diagnostics` is non-empty the program did
/// not link and the handle draws nothing.
#[derive(Debug, Clone)]
pub struct ProgramBuild {
    pub handle: ProgramHandle,
    pub diagnostics: Vec<ProgramDiagnostic>,
}

impl ProgramBuild {
    pub fn is_linked(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Main graphics device trait
pub trait GraphicsDevice {
    /// Resource limits of the device
    fn limits(&self) -> DeviceLimits;

    /// Driver identification
    fn info(&self) -> DeviceInfo;

    // Buffers

    /// Create a buffer of `size` bytes with undefined contents
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: u32,
        usage: BufferUsage,
    ) -> DeviceResult<BufferHandle>;

    /// Bind a buffer to its target, or clear the target
    fn bind_buffer(&mut self, kind: BufferKind, buffer: Option<BufferHandle>);

    /// Copy data into a buffer
    fn buffer_sub_data(&mut self, buffer: BufferHandle, offset: u32, data: &[u8])
        -> DeviceResult<()>;

    /// Map the whole buffer for writing. The buffer must currently be bound.
    fn map_buffer(&mut self, buffer: BufferHandle) -> DeviceResult<&mut [u8]>;

    /// Release a mapping established by [`GraphicsDevice::map_buffer`]
    fn unmap_buffer(&mut self, buffer: BufferHandle);

    /// Bind a byte range of a buffer to an indexed binding point
    fn bind_buffer_range(
        &mut self,
        kind: BufferKind,
        binding: u32,
        buffer: BufferHandle,
        offset: u32,
        size: u32,
    );

    fn delete_buffer(&mut self, buffer: BufferHandle);

    // Textures

    /// Create a 2D texture, optionally filled with `pixels`
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> DeviceResult<TextureHandle>;

    /// Bind a texture to a sampler slot
    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>);

    fn delete_texture(&mut self, texture: TextureHandle);

    // Framebuffers

    fn create_framebuffer(&mut self) -> DeviceResult<FramebufferHandle>;

    fn attach_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
    );

    /// Enable the first `count` color attachments as draw outputs
    fn set_draw_buffers(&mut self, framebuffer: FramebufferHandle, count: u32);

    fn framebuffer_status(&mut self, framebuffer: FramebufferHandle) -> FramebufferStatus;

    /// Bind a framebuffer for drawing; `None` is the default framebuffer
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);

    // Programs

    /// Compile and link a program. Never fails outright, see [`ProgramBuild`].
    fn build_program(&mut self, sources: &ProgramSources<'_>) -> ProgramBuild;

    /// Active vertex inputs of a program, ordered by location
    fn active_attributes(&self, program: ProgramHandle) -> Vec<ShaderInput>;

    fn use_program(&mut self, program: Option<ProgramHandle>);

    fn delete_program(&mut self, program: ProgramHandle);

    // Vertex arrays

    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayHandle>;

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);

    /// Describe a float attribute sourced from the bound vertex buffer and enable it
    fn vertex_attribute(&mut self, location: u32, component_count: u32, stride: u32, offset: u32);

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    // Drawing

    fn set_viewport(&mut self, width: u32, height: u32);

    fn set_depth_test(&mut self, enabled: bool);

    /// Clear the bound framebuffer's color outputs, and depth when `depth` is set
    fn clear(&mut self, color: [f32; 4], depth: bool);

    /// Draw indexed triangles from the bound vertex array
    fn draw_indexed(&mut self, index_count: u32, index_type: IndexType, byte_offset: u32);

    // Debug markers

    fn push_debug_group(&mut self, label: &str);

    fn pop_debug_group(&mut self);
}
