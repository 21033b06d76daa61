//! OpenGL device over glow
//!
//! The GL context is created by the platform layer (winit + glutin, SDL, ...)
//! and handed over as a [`glow::Context`]. Objects are tracked in maps keyed by
//! the crate's handle ids so that handles stay valid across native name reuse.

use std::collections::HashMap;

use glow::HasContext;

use crate::backend::traits::*;
use crate::backend::types::*;

struct GlBuffer {
    raw: glow::NativeBuffer,
    kind: BufferKind,
    size: u32,
}

/// OpenGL graphics device
pub struct GlDevice {
    gl: glow::Context,
    limits: DeviceLimits,
    next_id: u64,
    buffers: HashMap<u64, GlBuffer>,
    textures: HashMap<u64, glow::NativeTexture>,
    framebuffers: HashMap<u64, glow::NativeFramebuffer>,
    programs: HashMap<u64, glow::NativeProgram>,
    vertex_arrays: HashMap<u64, glow::NativeVertexArray>,
}

impl GlDevice {
    /// Wrap a current GL context. Installs a debug message callback when the
    /// driver supports `KHR_debug`.
    pub fn new(mut gl: glow::Context) -> Self {
        let limits = unsafe {
            DeviceLimits {
                max_uniform_block_size: gl.get_parameter_i32(glow::MAX_UNIFORM_BLOCK_SIZE).max(0)
                    as u32,
                uniform_buffer_offset_alignment: gl
                    .get_parameter_i32(glow::UNIFORM_BUFFER_OFFSET_ALIGNMENT)
                    .max(1) as u32,
            }
        };

        unsafe {
            if gl.supports_debug() {
                gl.enable(glow::DEBUG_OUTPUT);
                gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
                gl.debug_message_callback(|_source, kind, id, severity, message| {
                    if kind == glow::DEBUG_TYPE_PUSH_GROUP || kind == glow::DEBUG_TYPE_POP_GROUP {
                        return;
                    }
                    match severity {
                        glow::DEBUG_SEVERITY_HIGH => log::error!("GL [{id}]: {message}"),
                        glow::DEBUG_SEVERITY_MEDIUM => log::warn!("GL [{id}]: {message}"),
                        glow::DEBUG_SEVERITY_LOW => log::info!("GL [{id}]: {message}"),
                        _ => log::trace!("GL [{id}]: {message}"),
                    }
                });
            }
        }

        Self {
            gl,
            limits,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
        }
    }

    /// Access the underlying context
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn buffer_target(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Vertex => glow::ARRAY_BUFFER,
        BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
        BufferKind::Uniform => glow::UNIFORM_BUFFER,
    }
}

/// (internal format, pixel format, pixel type)
fn texture_format(format: TextureFormat) -> (u32, u32, u32) {
    match format {
        TextureFormat::Rgb8 => (glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Depth24Stencil8 => (
            glow::DEPTH24_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::UNSIGNED_INT_24_8,
        ),
    }
}

fn texture_filter(filter: TextureFilter) -> i32 {
    (match filter {
        TextureFilter::Nearest => glow::NEAREST,
        TextureFilter::Linear => glow::LINEAR,
        TextureFilter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

fn framebuffer_status(code: u32) -> FramebufferStatus {
    match code {
        glow::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
        glow::FRAMEBUFFER_UNDEFINED => FramebufferStatus::Undefined,
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => FramebufferStatus::IncompleteAttachment,
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => FramebufferStatus::MissingAttachment,
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => FramebufferStatus::IncompleteDrawBuffer,
        glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => FramebufferStatus::IncompleteReadBuffer,
        glow::FRAMEBUFFER_UNSUPPORTED => FramebufferStatus::Unsupported,
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => FramebufferStatus::IncompleteMultisample,
        glow::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => FramebufferStatus::IncompleteLayerTargets,
        other => FramebufferStatus::Unknown(other),
    }
}

/// Number of scalar components of an active attribute type
fn attribute_components(gl_type: u32) -> u32 {
    match gl_type {
        glow::FLOAT_VEC2 | glow::INT_VEC2 | glow::UNSIGNED_INT_VEC2 => 2,
        glow::FLOAT_VEC3 | glow::INT_VEC3 | glow::UNSIGNED_INT_VEC3 => 3,
        glow::FLOAT_VEC4 | glow::INT_VEC4 | glow::UNSIGNED_INT_VEC4 | glow::FLOAT_MAT2 => 4,
        glow::FLOAT_MAT3 => 9,
        glow::FLOAT_MAT4 => 16,
        _ => 1,
    }
}

fn compile_stage(
    gl: &glow::Context,
    stage: ShaderStage,
    source: &str,
) -> Result<glow::NativeShader, String> {
    let shader_type = match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    };
    unsafe {
        let shader = gl.create_shader(shader_type)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let message = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(message);
        }
        Ok(shader)
    }
}

impl GraphicsDevice for GlDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn info(&self) -> DeviceInfo {
        unsafe {
            let mut extensions: Vec<String> =
                self.gl.supported_extensions().iter().cloned().collect();
            extensions.sort();
            DeviceInfo {
                version: self.gl.get_parameter_string(glow::VERSION),
                renderer: self.gl.get_parameter_string(glow::RENDERER),
                vendor: self.gl.get_parameter_string(glow::VENDOR),
                extensions,
            }
        }
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: u32,
        usage: BufferUsage,
    ) -> DeviceResult<BufferHandle> {
        let gl_usage = match usage {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Stream => glow::STREAM_DRAW,
        };
        // Uploads go through the copy target so an element buffer binding
        // never leaks into whatever vertex array is bound.
        let raw = unsafe {
            let raw = self
                .gl
                .create_buffer()
                .map_err(DeviceError::BufferCreationFailed)?;
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(raw));
            self.gl
                .buffer_data_size(glow::COPY_WRITE_BUFFER, size as i32, gl_usage);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
            raw
        };

        let handle = BufferHandle(self.allocate_id());
        self.buffers.insert(handle.0, GlBuffer { raw, kind, size });
        Ok(handle)
    }

    fn bind_buffer(&mut self, kind: BufferKind, buffer: Option<BufferHandle>) {
        let raw = buffer.and_then(|b| self.buffers.get(&b.0)).map(|b| b.raw);
        unsafe { self.gl.bind_buffer(buffer_target(kind), raw) };
    }

    fn buffer_sub_data(
        &mut self,
        buffer: BufferHandle,
        offset: u32,
        data: &[u8],
    ) -> DeviceResult<()> {
        let target = self
            .buffers
            .get(&buffer.0)
            .ok_or(DeviceError::InvalidHandle("buffer"))?;
        if offset as usize + data.len() > target.size as usize {
            return Err(DeviceError::OutOfBounds {
                offset,
                len: data.len(),
                capacity: target.size,
            });
        }
        unsafe {
            self.gl
                .bind_buffer(glow::COPY_WRITE_BUFFER, Some(target.raw));
            self.gl
                .buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset as i32, data);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        Ok(())
    }

    fn map_buffer(&mut self, buffer: BufferHandle) -> DeviceResult<&mut [u8]> {
        let target = self
            .buffers
            .get(&buffer.0)
            .ok_or(DeviceError::InvalidHandle("buffer"))?;
        let binding = match target.kind {
            BufferKind::Vertex => glow::ARRAY_BUFFER_BINDING,
            BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER_BINDING,
            BufferKind::Uniform => glow::UNIFORM_BUFFER_BINDING,
        };

        unsafe {
            let bound = self.gl.get_parameter_i32(binding) as u32;
            if bound != target.raw.0.get() {
                return Err(DeviceError::MapFailed(format!(
                    "{:?} buffer {buffer:?} is not bound",
                    target.kind
                )));
            }

            let ptr = self.gl.map_buffer_range(
                buffer_target(target.kind),
                0,
                target.size as i32,
                glow::MAP_WRITE_BIT | glow::MAP_INVALIDATE_BUFFER_BIT,
            );
            if ptr.is_null() {
                return Err(DeviceError::MapFailed(format!(
                    "driver returned no mapping for {buffer:?}"
                )));
            }
            // SAFETY: the driver mapped `size` writable bytes that stay valid
            // until unmap_buffer, which needs another &mut borrow of the device.
            Ok(std::slice::from_raw_parts_mut(ptr, target.size as usize))
        }
    }

    fn unmap_buffer(&mut self, buffer: BufferHandle) {
        if let Some(target) = self.buffers.get(&buffer.0) {
            unsafe { self.gl.unmap_buffer(buffer_target(target.kind)) };
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
        let raw = self.buffers.get(&buffer.0).map(|b| b.raw);
        unsafe {
            self.gl.bind_buffer_range(
                buffer_target(kind),
                binding,
                raw,
                offset as i32,
                size as i32,
            )
        };
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Some(target) = self.buffers.remove(&buffer.0) {
            unsafe { self.gl.delete_buffer(target.raw) };
        }
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> DeviceResult<TextureHandle> {
        let (internal_format, format, pixel_type) = texture_format(desc.format);
        let wrap = match desc.wrap {
            TextureWrap::ClampToEdge => glow::CLAMP_TO_EDGE,
            TextureWrap::Repeat => glow::REPEAT,
        } as i32;

        let raw = unsafe {
            let raw = self
                .gl
                .create_texture()
                .map_err(DeviceError::TextureCreationFailed)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                texture_filter(desc.min_filter),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                texture_filter(desc.mag_filter),
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap);
            if desc.format == TextureFormat::Rgb8 {
                self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            }
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format as i32,
                desc.width as i32,
                desc.height as i32,
                0,
                format,
                pixel_type,
                pixels,
            );
            if desc.mipmaps {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            raw
        };

        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(handle.0, raw);
        Ok(handle)
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>) {
        let raw = texture.and_then(|t| self.textures.get(&t.0)).copied();
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + slot);
            self.gl.bind_texture(glow::TEXTURE_2D, raw);
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if let Some(raw) = self.textures.remove(&texture.0) {
            unsafe { self.gl.delete_texture(raw) };
        }
    }

    fn create_framebuffer(&mut self) -> DeviceResult<FramebufferHandle> {
        let raw = unsafe {
            self.gl
                .create_framebuffer()
                .map_err(DeviceError::FramebufferCreationFailed)?
        };
        let handle = FramebufferHandle(self.allocate_id());
        self.framebuffers.insert(handle.0, raw);
        Ok(handle)
    }

    fn attach_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
    ) {
        let (Some(fbo), Some(raw)) = (
            self.framebuffers.get(&framebuffer.0).copied(),
            self.textures.get(&texture.0).copied(),
        ) else {
            log::warn!("GlDevice: attach {texture:?} to {framebuffer:?} with unknown handle");
            return;
        };
        let point = match attachment {
            Attachment::Color(index) => glow::COLOR_ATTACHMENT0 + index,
            Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
        };
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            self.gl
                .framebuffer_texture_2d(glow::FRAMEBUFFER, point, glow::TEXTURE_2D, Some(raw), 0);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn set_draw_buffers(&mut self, framebuffer: FramebufferHandle, count: u32) {
        let Some(fbo) = self.framebuffers.get(&framebuffer.0).copied() else {
            return;
        };
        let buffers: Vec<u32> = (0..count).map(|i| glow::COLOR_ATTACHMENT0 + i).collect();
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            self.gl.draw_buffers(&buffers);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(fbo) = self.framebuffers.get(&framebuffer.0).copied() else {
            return FramebufferStatus::Undefined;
        };
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            let code = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            framebuffer_status(code)
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        let raw = framebuffer.and_then(|f| self.framebuffers.get(&f.0)).copied();
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, raw) };
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if let Some(raw) = self.framebuffers.remove(&framebuffer.0) {
            unsafe { self.gl.delete_framebuffer(raw) };
        }
    }

    fn build_program(&mut self, sources: &ProgramSources<'_>) -> ProgramBuild {
        let handle = ProgramHandle(self.allocate_id());
        let mut diagnostics = Vec::new();
        let mut shaders = Vec::new();

        for (stage, source) in [
            (ShaderStage::Vertex, sources.vertex),
            (ShaderStage::Fragment, sources.fragment),
        ] {
            match compile_stage(&self.gl, stage, source) {
                Ok(shader) => shaders.push(shader),
                Err(message) => diagnostics.push(ProgramDiagnostic {
                    stage: Some(stage),
                    message,
                }),
            }
        }

        unsafe {
            if diagnostics.is_empty() {
                match self.gl.create_program() {
                    Ok(program) => {
                        for &shader in &shaders {
                            self.gl.attach_shader(program, shader);
                        }
                        self.gl.link_program(program);
                        for &shader in &shaders {
                            self.gl.detach_shader(program, shader);
                        }
                        if self.gl.get_program_link_status(program) {
                            self.programs.insert(handle.0, program);
                        } else {
                            diagnostics.push(ProgramDiagnostic {
                                stage: None,
                                message: self.gl.get_program_info_log(program),
                            });
                            self.gl.delete_program(program);
                        }
                    }
                    Err(message) => diagnostics.push(ProgramDiagnostic {
                        stage: None,
                        message,
                    }),
                }
            }
            for shader in shaders {
                self.gl.delete_shader(shader);
            }
        }

        ProgramBuild {
            handle,
            diagnostics,
        }
    }

    fn active_attributes(&self, program: ProgramHandle) -> Vec<ShaderInput> {
        let Some(raw) = self.programs.get(&program.0).copied() else {
            return Vec::new();
        };
        unsafe {
            let mut inputs: Vec<ShaderInput> = (0..self.gl.get_active_attributes(raw))
                .filter_map(|index| self.gl.get_active_attribute(raw, index))
                .filter(|attribute| !attribute.name.starts_with("gl_"))
                .filter_map(|attribute| {
                    let location = self.gl.get_attrib_location(raw, &attribute.name)?;
                    Some(ShaderInput {
                        location,
                        component_count: attribute_components(attribute.atype),
                    })
                })
                .collect();
            inputs.sort_by_key(|input| input.location);
            inputs
        }
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        let raw = program.and_then(|p| self.programs.get(&p.0)).copied();
        unsafe { self.gl.use_program(raw) };
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if let Some(raw) = self.programs.remove(&program.0) {
            unsafe { self.gl.delete_program(raw) };
        }
    }

    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayHandle> {
        let raw = unsafe {
            self.gl
                .create_vertex_array()
                .map_err(DeviceError::VertexArrayCreationFailed)?
        };
        let handle = VertexArrayHandle(self.allocate_id());
        self.vertex_arrays.insert(handle.0, raw);
        Ok(handle)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        let raw = vertex_array
            .and_then(|v| self.vertex_arrays.get(&v.0))
            .copied();
        unsafe { self.gl.bind_vertex_array(raw) };
    }

    fn vertex_attribute(&mut self, location: u32, component_count: u32, stride: u32, offset: u32) {
        unsafe {
            self.gl.enable_vertex_attrib_array(location);
            self.gl.vertex_attrib_pointer_f32(
                location,
                component_count as i32,
                glow::FLOAT,
                false,
                stride as i32,
                offset as i32,
            );
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if let Some(raw) = self.vertex_arrays.remove(&vertex_array.0) {
            unsafe { self.gl.delete_vertex_array(raw) };
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn clear(&mut self, color: [f32; 4], depth: bool) {
        let mut mask = glow::COLOR_BUFFER_BIT;
        if depth {
            mask |= glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT;
        }
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear(mask);
        }
    }

    fn draw_indexed(&mut self, index_count: u32, index_type: IndexType, byte_offset: u32) {
        let element_type = match index_type {
            IndexType::U16 => glow::UNSIGNED_SHORT,
            IndexType::U32 => glow::UNSIGNED_INT,
        };
        unsafe {
            self.gl.draw_elements(
                glow::TRIANGLES,
                index_count as i32,
                element_type,
                byte_offset as i32,
            )
        };
    }

    fn push_debug_group(&mut self, label: &str) {
        unsafe {
            if self.gl.supports_debug() {
                self.gl
                    .push_debug_group(glow::DEBUG_SOURCE_APPLICATION, 0, label);
            }
        }
    }

    fn pop_debug_group(&mut self) {
        unsafe {
            if self.gl.supports_debug() {
                self.gl.pop_debug_group();
            }
        }
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        unsafe {
            for (_, vao) in self.vertex_arrays.drain() {
                self.gl.delete_vertex_array(vao);
            }
            for (_, program) in self.programs.drain() {
                self.gl.delete_program(program);
            }
            for (_, fbo) in self.framebuffers.drain() {
                self.gl.delete_framebuffer(fbo);
            }
            for (_, texture) in self.textures.drain() {
                self.gl.delete_texture(texture);
            }
            for (_, buffer) in self.buffers.drain() {
                self.gl.delete_buffer(buffer.raw);
            }
        }
    }
}
