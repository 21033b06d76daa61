//! Common types shared between devices

use std::fmt;

/// Target a buffer is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

/// How often the buffer contents are rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once at upload time (mesh data)
    Static,
    /// Rewritten every frame (parameter blocks)
    Stream,
}

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgb8,
    Rgba8,
    Depth24Stencil8,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth24Stencil8)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 | TextureFormat::Depth24Stencil8 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap: TextureWrap,
    pub mipmaps: bool,
}

impl TextureDescriptor {
    /// Off-screen attachment: nearest filtering, edge clamping, no mipmaps
    pub fn render_target(label: &str, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            label: Some(label.to_string()),
            width,
            height,
            format,
            min_filter: TextureFilter::Nearest,
            mag_filter: TextureFilter::Nearest,
            wrap: TextureWrap::ClampToEdge,
            mipmaps: false,
        }
    }

    /// Material texture: trilinear filtering with a generated mip chain
    pub fn sampled(label: &str, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            label: Some(label.to_string()),
            width,
            height,
            format,
            min_filter: TextureFilter::LinearMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap: TextureWrap::ClampToEdge,
            mipmaps: true,
        }
    }

    /// Size in bytes of the base level
    pub fn byte_size(&self) -> usize {
        (self.width * self.height * self.format.bytes_per_pixel()) as usize
    }
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    DepthStencil,
}

/// Result of a framebuffer completeness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    Undefined,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDimensions,
    IncompleteDrawBuffer,
    IncompleteReadBuffer,
    Unsupported,
    IncompleteMultisample,
    IncompleteLayerTargets,
    Unknown(u32),
}

impl FramebufferStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, FramebufferStatus::Complete)
    }
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Undefined => write!(f, "framebuffer undefined"),
            Self::IncompleteAttachment => write!(f, "incomplete attachment"),
            Self::MissingAttachment => write!(f, "missing attachment"),
            Self::IncompleteDimensions => write!(f, "attachments differ in size"),
            Self::IncompleteDrawBuffer => write!(f, "incomplete draw buffer"),
            Self::IncompleteReadBuffer => write!(f, "incomplete read buffer"),
            Self::Unsupported => write!(f, "unsupported attachment combination"),
            Self::IncompleteMultisample => write!(f, "incomplete multisample"),
            Self::IncompleteLayerTargets => write!(f, "incomplete layer targets"),
            Self::Unknown(code) => write!(f, "unknown framebuffer status 0x{code:x}"),
        }
    }
}

/// Programmable stage of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Preprocessor symbol guarding this stage in a combined source file
    pub fn define(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
        }
    }
}

/// An active vertex input of a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderInput {
    pub location: u32,
    pub component_count: u32,
}

/// Stage sources handed to the device for compilation
#[derive(Debug, Clone, Copy)]
pub struct ProgramSources<'a> {
    pub label: &'a str,
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// Compiler or linker message reported for a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDiagnostic {
    /// `None` for link-time messages
    pub stage: Option<ShaderStage>,
    pub message: String,
}

impl fmt::Display for ProgramDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{stage:?} stage: {}", self.message),
            None => write!(f, "link: {}", self.message),
        }
    }
}

/// Device resource limits the pipeline sizes itself against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_uniform_block_size: u32,
    pub uniform_buffer_offset_alignment: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_uniform_block_size: 64 * 1024,
            uniform_buffer_offset_alignment: 256,
        }
    }
}

/// Driver identification strings
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub version: String,
    pub renderer: String,
    pub vendor: String,
    pub extensions: Vec<String>,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}
