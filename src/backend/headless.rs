//! Headless graphics device for testing and tooling.
//!
//! This device doesn't rasterize anything. Buffers and textures live in host
//! memory, framebuffers are validated the way a driver would, and every draw
//! is recorded together with the state it was issued under. Shader sources are
//! parsed with naga so broken programs fail to "link" and active vertex inputs
//! can be reflected.
//!
//! naga's GLSL frontend only knows the separate `textureXX` and `sampler`
//! types, so combined `samplerXX` uniforms are split into that pair before
//! parsing. The old name becomes a macro for the `samplerXX(texture, sampler)`
//! constructor and the sampling calls in the shader body stay untouched.

use std::collections::{BTreeMap, HashMap};

use crate::backend::traits::*;
use crate::backend::types::*;

/// Uniform buffer range bound to an indexed binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformRange {
    pub binding: u32,
    pub buffer: BufferHandle,
    pub offset: u32,
    pub size: u32,
}

/// Attribute recorded in a vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeState {
    pub location: u32,
    pub component_count: u32,
    pub stride: u32,
    pub offset: u32,
    pub buffer: BufferHandle,
}

/// A recorded draw together with the state it was issued under
#[derive(Debug, Clone)]
pub struct DrawCall {
    /// Innermost debug group open at the time of the draw
    pub debug_group: Option<String>,
    pub framebuffer: Option<FramebufferHandle>,
    pub program: Option<ProgramHandle>,
    pub program_label: Option<String>,
    pub program_linked: bool,
    pub vertex_array: Option<VertexArrayHandle>,
    pub index_count: u32,
    pub index_type: IndexType,
    pub byte_offset: u32,
    pub viewport: (u32, u32),
    pub depth_test: bool,
    pub textures: Vec<(u32, TextureHandle)>,
    pub uniform_ranges: Vec<UniformRange>,
}

impl DrawCall {
    pub fn texture_at(&self, slot: u32) -> Option<TextureHandle> {
        self.textures
            .iter()
            .find(|(bound_slot, _)| *bound_slot == slot)
            .map(|(_, texture)| *texture)
    }

    pub fn uniform_range(&self, binding: u32) -> Option<UniformRange> {
        self.uniform_ranges
            .iter()
            .find(|range| range.binding == binding)
            .copied()
    }
}

/// Object counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub buffers_created: u32,
    pub textures_created: u32,
    pub framebuffers_created: u32,
    pub programs_built: u32,
    pub programs_deleted: u32,
    pub vertex_arrays_created: u32,
    pub buffer_maps: u32,
    pub clears: u32,
}

struct HeadlessBuffer {
    kind: BufferKind,
    data: Vec<u8>,
    mapped: bool,
}

struct HeadlessFramebuffer {
    colors: BTreeMap<u32, TextureHandle>,
    depth: Option<TextureHandle>,
    draw_buffers: u32,
}

struct HeadlessProgram {
    label: String,
    inputs: Vec<ShaderInput>,
    linked: bool,
}

#[derive(Default)]
struct HeadlessVertexArray {
    attributes: Vec<VertexAttributeState>,
    index_buffer: Option<BufferHandle>,
}

/// Headless graphics device.
pub struct HeadlessDevice {
    limits: DeviceLimits,
    next_id: u64,
    buffers: HashMap<u64, HeadlessBuffer>,
    textures: HashMap<u64, TextureDescriptor>,
    framebuffers: HashMap<u64, HeadlessFramebuffer>,
    programs: HashMap<u64, HeadlessProgram>,
    vertex_arrays: HashMap<u64, HeadlessVertexArray>,
    bound_buffers: HashMap<BufferKind, BufferHandle>,
    uniform_bindings: BTreeMap<u32, UniformRange>,
    texture_slots: BTreeMap<u32, TextureHandle>,
    framebuffer: Option<FramebufferHandle>,
    program: Option<ProgramHandle>,
    vertex_array: Option<VertexArrayHandle>,
    viewport: (u32, u32),
    depth_test: bool,
    last_clear: Option<[f32; 4]>,
    debug_groups: Vec<String>,
    draws: Vec<DrawCall>,
    stats: HeadlessStats,
}

impl HeadlessDevice {
    /// Create a headless device with default limits.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    /// Create a headless device reporting the given limits.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            limits,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            bound_buffers: HashMap::new(),
            uniform_bindings: BTreeMap::new(),
            texture_slots: BTreeMap::new(),
            framebuffer: None,
            program: None,
            vertex_array: None,
            viewport: (0, 0),
            depth_test: false,
            last_clear: None,
            debug_groups: Vec::new(),
            draws: Vec::new(),
            stats: HeadlessStats::default(),
        }
    }

    /// Get the device name.
    pub fn name(&self) -> &'static str {
        "Headless Device"
    }

    /// Draws recorded since creation or the last [`HeadlessDevice::take_draws`].
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    /// Current contents of a buffer
    pub fn read_buffer(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.data.as_slice())
    }

    /// Attributes recorded in a vertex array
    pub fn vertex_array_attributes(
        &self,
        vertex_array: VertexArrayHandle,
    ) -> Option<&[VertexAttributeState]> {
        self.vertex_arrays
            .get(&vertex_array.0)
            .map(|vao| vao.attributes.as_slice())
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn is_program_alive(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program.0)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    /// Textures attached to a framebuffer, color attachments first
    pub fn framebuffer_attachments(&self, framebuffer: FramebufferHandle) -> Vec<TextureHandle> {
        self.framebuffers
            .get(&framebuffer.0)
            .map(|target| target.colors.values().copied().chain(target.depth).collect())
            .unwrap_or_default()
    }

    pub fn uniform_binding(&self, binding: u32) -> Option<UniformRange> {
        self.uniform_bindings.get(&binding).copied()
    }

    /// Color passed to the most recent clear
    pub fn last_clear_color(&self) -> Option<[f32; 4]> {
        self.last_clear
    }

    /// Number of debug groups currently open
    pub fn debug_group_depth(&self) -> usize {
        self.debug_groups.len()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            version: "4.5 (headless)".to_string(),
            renderer: self.name().to_string(),
            vendor: env!("CARGO_PKG_NAME").to_string(),
            extensions: Vec::new(),
        }
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: u32,
        usage: BufferUsage,
    ) -> DeviceResult<BufferHandle> {
        let handle = BufferHandle(self.allocate_id());
        log::trace!(
            "HeadlessDevice: creating {:?} buffer {:?} (size: {}, usage: {:?})",
            kind,
            handle,
            size,
            usage
        );
        self.buffers.insert(
            handle.0,
            HeadlessBuffer {
                kind,
                data: vec![0; size as usize],
                mapped: false,
            },
        );
        self.stats.buffers_created += 1;
        Ok(handle)
    }

    fn bind_buffer(&mut self, kind: BufferKind, buffer: Option<BufferHandle>) {
        match buffer {
            Some(handle) => {
                self.bound_buffers.insert(kind, handle);
            }
            None => {
                self.bound_buffers.remove(&kind);
            }
        }

        // Element buffer bindings are vertex array state
        if kind == BufferKind::Index {
            if let Some(vao) = self
                .vertex_array
                .and_then(|vao| self.vertex_arrays.get_mut(&vao.0))
            {
                vao.index_buffer = buffer;
            }
        }
    }

    fn buffer_sub_data(
        &mut self,
        buffer: BufferHandle,
        offset: u32,
        data: &[u8],
    ) -> DeviceResult<()> {
        let target = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or(DeviceError::InvalidHandle("buffer"))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            return Err(DeviceError::OutOfBounds {
                offset,
                len: data.len(),
                capacity: target.data.len() as u32,
            });
        }
        target.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn map_buffer(&mut self, buffer: BufferHandle) -> DeviceResult<&mut [u8]> {
        let kind = self
            .buffers
            .get(&buffer.0)
            .ok_or(DeviceError::InvalidHandle("buffer"))?
            .kind;
        if self.bound_buffers.get(&kind) != Some(&buffer) {
            return Err(DeviceError::MapFailed(format!(
                "{kind:?} buffer {buffer:?} is not bound"
            )));
        }

        self.stats.buffer_maps += 1;
        let target = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or(DeviceError::InvalidHandle("buffer"))?;
        if target.mapped {
            return Err(DeviceError::MapFailed(format!(
                "buffer {buffer:?} is already mapped"
            )));
        }
        target.mapped = true;
        Ok(target.data.as_mut_slice())
    }

    fn unmap_buffer(&mut self, buffer: BufferHandle) {
        if let Some(target) = self.buffers.get_mut(&buffer.0) {
            target.mapped = false;
        }
    }

    fn bind_buffer_range(
        &mut self,
        kind: BufferKind,
        binding: u32,
        buffer: BufferHandle,
        offset: u32,
        size: u32,
    ) {
        debug_assert_eq!(kind, BufferKind::Uniform, "only uniform ranges are indexed");
        if offset % self.limits.uniform_buffer_offset_alignment != 0 {
            log::warn!(
                "HeadlessDevice: range offset {} is not a multiple of {}",
                offset,
                self.limits.uniform_buffer_offset_alignment
            );
        }
        self.uniform_bindings.insert(
            binding,
            UniformRange {
                binding,
                buffer,
                offset,
                size,
            },
        );
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
        self.bound_buffers.retain(|_, bound| *bound != buffer);
        self.uniform_bindings.retain(|_, range| range.buffer != buffer);
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> DeviceResult<TextureHandle> {
        if let Some(pixels) = pixels {
            if pixels.len() < desc.byte_size() {
                return Err(DeviceError::TextureCreationFailed(format!(
                    "{:?}: {} bytes supplied, {} required",
                    desc.label,
                    pixels.len(),
                    desc.byte_size()
                )));
            }
        }

        let handle = TextureHandle(self.allocate_id());
        log::trace!(
            "HeadlessDevice: creating texture {:?} ({}x{} {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        self.textures.insert(handle.0, desc.clone());
        self.stats.textures_created += 1;
        Ok(handle)
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(handle) => {
                self.texture_slots.insert(slot, handle);
            }
            None => {
                self.texture_slots.remove(&slot);
            }
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.texture_slots.retain(|_, bound| *bound != texture);
    }

    fn create_framebuffer(&mut self) -> DeviceResult<FramebufferHandle> {
        let handle = FramebufferHandle(self.allocate_id());
        self.framebuffers.insert(
            handle.0,
            HeadlessFramebuffer {
                colors: BTreeMap::new(),
                depth: None,
                draw_buffers: 1,
            },
        );
        self.stats.framebuffers_created += 1;
        Ok(handle)
    }

    fn attach_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
    ) {
        let Some(target) = self.framebuffers.get_mut(&framebuffer.0) else {
            log::warn!("HeadlessDevice: attach to unknown framebuffer {framebuffer:?}");
            return;
        };
        match attachment {
            Attachment::Color(index) => {
                target.colors.insert(index, texture);
            }
            Attachment::DepthStencil => target.depth = Some(texture),
        }
    }

    fn set_draw_buffers(&mut self, framebuffer: FramebufferHandle, count: u32) {
        if let Some(target) = self.framebuffers.get_mut(&framebuffer.0) {
            target.draw_buffers = count;
        }
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(target) = self.framebuffers.get(&framebuffer.0) else {
            return FramebufferStatus::Undefined;
        };
        if target.colors.is_empty() && target.depth.is_none() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut size = None;
        for (&index, texture) in &target.colors {
            let Some(desc) = self.textures.get(&texture.0) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            if desc.format.is_depth() || index >= target.colors.len() as u32 {
                return FramebufferStatus::IncompleteAttachment;
            }
            if *size.get_or_insert((desc.width, desc.height)) != (desc.width, desc.height) {
                return FramebufferStatus::IncompleteDimensions;
            }
        }
        if let Some(depth) = target.depth {
            let Some(desc) = self.textures.get(&depth.0) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            if !desc.format.is_depth() {
                return FramebufferStatus::IncompleteAttachment;
            }
            if *size.get_or_insert((desc.width, desc.height)) != (desc.width, desc.height) {
                return FramebufferStatus::IncompleteDimensions;
            }
        }

        if target.draw_buffers as usize > target.colors.len() {
            return FramebufferStatus::IncompleteDrawBuffer;
        }
        FramebufferStatus::Complete
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.framebuffer = framebuffer;
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer.0);
        if self.framebuffer == Some(framebuffer) {
            self.framebuffer = None;
        }
    }

    fn build_program(&mut self, sources: &ProgramSources<'_>) -> ProgramBuild {
        let mut diagnostics = Vec::new();

        let vertex = match parse_stage(sources.vertex, ShaderStage::Vertex) {
            Ok(module) => Some(module),
            Err(message) => {
                diagnostics.push(ProgramDiagnostic {
                    stage: Some(ShaderStage::Vertex),
                    message,
                });
                None
            }
        };
        if let Err(message) = parse_stage(sources.fragment, ShaderStage::Fragment) {
            diagnostics.push(ProgramDiagnostic {
                stage: Some(ShaderStage::Fragment),
                message,
            });
        }

        let inputs = vertex.as_ref().map(vertex_inputs).unwrap_or_default();
        let linked = diagnostics.is_empty();
        let handle = ProgramHandle(self.allocate_id());
        log::trace!(
            "HeadlessDevice: built program '{}' {:?} (linked: {}, inputs: {})",
            sources.label,
            handle,
            linked,
            inputs.len()
        );
        self.programs.insert(
            handle.0,
            HeadlessProgram {
                label: sources.label.to_string(),
                inputs,
                linked,
            },
        );
        self.stats.programs_built += 1;

        ProgramBuild {
            handle,
            diagnostics,
        }
    }

    fn active_attributes(&self, program: ProgramHandle) -> Vec<ShaderInput> {
        self.programs
            .get(&program.0)
            .filter(|p| p.linked)
            .map(|p| p.inputs.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.program = program;
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program.0).is_some() {
            self.stats.programs_deleted += 1;
        }
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayHandle> {
        let handle = VertexArrayHandle(self.allocate_id());
        self.vertex_arrays
            .insert(handle.0, HeadlessVertexArray::default());
        self.stats.vertex_arrays_created += 1;
        Ok(handle)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.vertex_array = vertex_array;
    }

    fn vertex_attribute(&mut self, location: u32, component_count: u32, stride: u32, offset: u32) {
        let Some(buffer) = self.bound_buffers.get(&BufferKind::Vertex).copied() else {
            log::warn!("HeadlessDevice: vertex attribute {location} without a vertex buffer");
            return;
        };
        let Some(vao) = self
            .vertex_array
            .and_then(|vao| self.vertex_arrays.get_mut(&vao.0))
        else {
            log::warn!("HeadlessDevice: vertex attribute {location} without a vertex array");
            return;
        };

        let state = VertexAttributeState {
            location,
            component_count,
            stride,
            offset,
            buffer,
        };
        match vao.attributes.iter_mut().find(|a| a.location == location) {
            Some(existing) => *existing = state,
            None => vao.attributes.push(state),
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array.0);
        if self.vertex_array == Some(vertex_array) {
            self.vertex_array = None;
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn clear(&mut self, color: [f32; 4], depth: bool) {
        log::trace!(
            "HeadlessDevice: clear {:?} to {:?} (depth: {})",
            self.framebuffer,
            color,
            depth
        );
        self.last_clear = Some(color);
        self.stats.clears += 1;
    }

    fn draw_indexed(&mut self, index_count: u32, index_type: IndexType, byte_offset: u32) {
        let index_buffer = self
            .vertex_array
            .and_then(|vao| self.vertex_arrays.get(&vao.0))
            .and_then(|vao| vao.index_buffer)
            .and_then(|buffer| self.buffers.get(&buffer.0));
        match index_buffer {
            Some(buffer) => {
                let end = byte_offset as usize + (index_count * index_type.size()) as usize;
                if end > buffer.data.len() {
                    log::warn!(
                        "HeadlessDevice: draw reads indices up to byte {} of {}",
                        end,
                        buffer.data.len()
                    );
                }
            }
            None => log::warn!("HeadlessDevice: draw without an index buffer"),
        }

        let program = self.program.and_then(|p| self.programs.get(&p.0));
        self.draws.push(DrawCall {
            debug_group: self.debug_groups.last().cloned(),
            framebuffer: self.framebuffer,
            program: self.program,
            program_label: program.map(|p| p.label.clone()),
            program_linked: program.is_some_and(|p| p.linked),
            vertex_array: self.vertex_array,
            index_count,
            index_type,
            byte_offset,
            viewport: self.viewport,
            depth_test: self.depth_test,
            textures: self.texture_slots.iter().map(|(s, t)| (*s, *t)).collect(),
            uniform_ranges: self.uniform_bindings.values().copied().collect(),
        });
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_groups.push(label.to_string());
    }

    fn pop_debug_group(&mut self) {
        if self.debug_groups.pop().is_none() {
            log::warn!("HeadlessDevice: pop_debug_group without a matching push");
        }
    }
}

fn parse_stage(source: &str, stage: ShaderStage) -> Result<naga::Module, String> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let options = naga::front::glsl::Options {
        stage: naga_stage,
        defines: naga::FastHashMap::default(),
    };

    let source = lower_combined_samplers(source);
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&options, &source)
        .map_err(|errors| format!("GLSL parse error:\n{errors}"))?;

    if !module.entry_points.iter().any(|ep| ep.stage == naga_stage) {
        return Err("no entry point `main` for this stage".to_string());
    }
    Ok(module)
}

/// Rewrite every `layout(...) uniform samplerXX name;` line as a texture and
/// sampler declaration plus a `#define` restoring `name`.
fn lower_combined_samplers(source: &str) -> String {
    let mut lowered = String::with_capacity(source.len() + 256);
    for line in source.lines() {
        match split_combined_sampler(line) {
            Some(split) => lowered.push_str(&split),
            None => lowered.push_str(line),
        }
        lowered.push('\n');
    }
    lowered
}

fn split_combined_sampler(line: &str) -> Option<String> {
    let (layout, rest) = line.trim().strip_prefix("layout(")?.split_once(')')?;
    let rest = rest.trim_start().strip_prefix("uniform ")?;
    let mut tokens = rest.trim().strip_suffix(';')?.split_whitespace();
    let (combined, name) = (tokens.next()?, tokens.next()?);
    if tokens.next().is_some() {
        return None;
    }

    let dims = combined.strip_prefix("sampler")?;
    if dims.is_empty() || dims == "Shadow" {
        return None;
    }
    let (texture, sampler) = match dims.strip_suffix("Shadow") {
        Some(base) => (format!("texture{base}"), "samplerShadow"),
        None => (format!("texture{dims}"), "sampler"),
    };

    // Samplers go to their own set so texture bindings stay unique
    Some(format!(
        "layout({layout}) uniform {texture} {name}_texture;\n\
         layout(set = 1, {layout}) uniform {sampler} {name}_sampler;\n\
         #define {name} {combined}({name}_texture, {name}_sampler)"
    ))
}

/// Location-bound arguments of the vertex entry point
fn vertex_inputs(module: &naga::Module) -> Vec<ShaderInput> {
    let Some(entry) = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex)
    else {
        return Vec::new();
    };

    let mut inputs: Vec<ShaderInput> = entry
        .function
        .arguments
        .iter()
        .filter_map(|argument| {
            let location = match argument.binding {
                Some(naga::Binding::Location { location, .. }) => location,
                _ => return None,
            };
            let component_count = match module.types[argument.ty].inner {
                naga::TypeInner::Vector { size, .. } => size as u32,
                naga::TypeInner::Matrix { columns, rows, .. } => columns as u32 * rows as u32,
                _ => 1,
            };
            Some(ShaderInput {
                location,
                component_count,
            })
        })
        .collect();
    inputs.sort_by_key(|input| input.location);
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "#version 450 core
layout(location = 0) in vec3 aPosition;
layout(location = 2) in vec2 aTexCoord;
layout(location = 0) out vec2 vTexCoord;
void main() {
    vTexCoord = aTexCoord;
    gl_Position = vec4(aPosition, 1.0);
}
";

    const FRAGMENT: &str = "#version 450 core
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 oColor;
void main() {
    oColor = vec4(vTexCoord, 0.0, 1.0);
}
";

    #[test]
    fn test_reflects_vertex_inputs() {
        let mut device = HeadlessDevice::new();
        let build = device.build_program(&ProgramSources {
            label: "reflect",
            vertex: VERTEX,
            fragment: FRAGMENT,
        });

        assert!(build.is_linked(), "{:?}", build.diagnostics);
        assert_eq!(
            device.active_attributes(build.handle),
            vec![
                ShaderInput {
                    location: 0,
                    component_count: 3
                },
                ShaderInput {
                    location: 2,
                    component_count: 2
                },
            ]
        );
    }

    #[test]
    fn test_broken_program_reports_diagnostics() {
        let mut device = HeadlessDevice::new();
        let build = device.build_program(&ProgramSources {
            label: "broken",
            vertex: "#version 450 core\nvoid main() { gl_Position = vec4(undefinedThing); }\n",
            fragment: FRAGMENT,
        });

        assert!(!build.is_linked());
        assert_eq!(build.diagnostics[0].stage, Some(ShaderStage::Vertex));
        assert!(device.active_attributes(build.handle).is_empty());
    }

    #[test]
    fn test_combined_samplers_are_split() {
        let lowered = lower_combined_samplers(
            "layout(binding = 2) uniform sampler2D uPosition;\nuniform float uAmbient;\n",
        );

        assert_eq!(
            lowered,
            "layout(binding = 2) uniform texture2D uPosition_texture;\n\
             layout(set = 1, binding = 2) uniform sampler uPosition_sampler;\n\
             #define uPosition sampler2D(uPosition_texture, uPosition_sampler)\n\
             uniform float uAmbient;\n"
        );
        assert!(split_combined_sampler("layout(binding = 0) uniform sampler uRaw;").is_none());
        assert!(split_combined_sampler(
            "layout(std140, binding = 0) uniform Global {"
        )
        .is_none());
    }

    #[test]
    fn test_shadow_samplers_keep_comparison() {
        let split =
            split_combined_sampler("layout(binding = 4) uniform sampler2DShadow uShadow;").unwrap();

        assert!(split.contains("uniform texture2D uShadow_texture;"));
        assert!(split.contains("uniform samplerShadow uShadow_sampler;"));
        assert!(split.ends_with("#define uShadow sampler2DShadow(uShadow_texture, uShadow_sampler)"));
    }

    #[test]
    fn test_sampling_program_links() {
        let fragment = "#version 450 core
layout(binding = 0) uniform sampler2D uSource;
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 oColor;
void main() {
    vec2 texel = 1.0 / vec2(textureSize(uSource, 0));
    oColor = texture(uSource, vTexCoord + texel);
}
";
        let mut device = HeadlessDevice::new();
        let build = device.build_program(&ProgramSources {
            label: "sampling",
            vertex: VERTEX,
            fragment,
        });

        assert!(build.is_linked(), "{:?}", build.diagnostics);
        assert_eq!(device.active_attributes(build.handle).len(), 2);
    }

    #[test]
    fn test_map_requires_binding() {
        let mut device = HeadlessDevice::new();
        let buffer = device
            .create_buffer(BufferKind::Uniform, 64, BufferUsage::Stream)
            .unwrap();

        assert!(matches!(
            device.map_buffer(buffer),
            Err(DeviceError::MapFailed(_))
        ));

        device.bind_buffer(BufferKind::Uniform, Some(buffer));
        device.map_buffer(buffer).unwrap()[..4].copy_from_slice(&[1, 2, 3, 4]);
        device.unmap_buffer(buffer);

        assert_eq!(&device.read_buffer(buffer).unwrap()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_framebuffer_status() {
        let mut device = HeadlessDevice::new();
        let fb = device.create_framebuffer().unwrap();
        assert_eq!(device.framebuffer_status(fb), FramebufferStatus::MissingAttachment);

        let color = device
            .create_texture(
                &TextureDescriptor::render_target("color", TextureFormat::Rgba8, 8, 8),
                None,
            )
            .unwrap();
        let small_depth = device
            .create_texture(
                &TextureDescriptor::render_target("depth", TextureFormat::Depth24Stencil8, 4, 4),
                None,
            )
            .unwrap();
        device.attach_texture(fb, Attachment::Color(0), color);
        assert!(device.framebuffer_status(fb).is_complete());

        device.set_draw_buffers(fb, 2);
        assert_eq!(device.framebuffer_status(fb), FramebufferStatus::IncompleteDrawBuffer);

        device.set_draw_buffers(fb, 1);
        device.attach_texture(fb, Attachment::DepthStencil, small_depth);
        assert_eq!(device.framebuffer_status(fb), FramebufferStatus::IncompleteDimensions);
        assert_eq!(device.framebuffer_attachments(fb), vec![color, small_depth]);
    }

    #[test]
    fn test_draw_records_state() {
        let mut device = HeadlessDevice::new();
        device.push_debug_group("outer");
        device.push_debug_group("inner");
        device.set_viewport(32, 16);
        device.draw_indexed(6, IndexType::U32, 0);
        device.pop_debug_group();
        device.pop_debug_group();

        let draw = &device.draws()[0];
        assert_eq!(draw.debug_group.as_deref(), Some("inner"));
        assert_eq!(draw.viewport, (32, 16));
        assert!(!draw.program_linked);
        assert_eq!(device.debug_group_depth(), 0);
    }
}
