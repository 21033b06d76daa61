//! Mesh data structures and generation
//!
//! A [`Mesh`] keeps its vertices as interleaved floats described by a
//! [`VertexLayout`]. Meshes are uploaded together as a [`Model`], which packs
//! them into one vertex buffer and one index buffer and records where each
//! mesh starts.
//!
//! Vertex arrays are built lazily per (mesh, program) pair: the program's
//! active inputs decide which layout attributes get wired up, and the result is
//! cached on the mesh for the lifetime of the mesh.

use glam::{Vec2, Vec3};

use super::{GraphicsBuffer, Material, ShaderProgram};
use crate::backend::{
    BufferKind, DeviceResult, GraphicsDevice, IndexType, ProgramHandle, VertexArrayHandle,
};

/// Attribute locations used by generated and imported meshes
pub mod locations {
    pub const POSITION: u32 = 0;
    pub const NORMAL: u32 = 1;
    pub const TEXCOORD: u32 = 2;
    pub const TANGENT: u32 = 3;
    pub const BITANGENT: u32 = 4;
}

/// One float attribute inside an interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub component_count: u32,
    /// Byte offset inside the vertex
    pub offset: u32,
}

/// Interleaved vertex layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position, normal and texture coordinates at locations 0, 1 and 2
    pub fn standard() -> Self {
        Self::new()
            .with_attribute(locations::POSITION, 3)
            .with_attribute(locations::NORMAL, 3)
            .with_attribute(locations::TEXCOORD, 2)
    }

    /// Append a float attribute after the current ones.
    ///
    /// # Panics
    ///
    /// Panics if `location` is already present.
    pub fn with_attribute(mut self, location: u32, component_count: u32) -> Self {
        assert!(
            self.attribute(location).is_none(),
            "vertex location {location} declared twice"
        );
        self.attributes.push(VertexAttribute {
            location,
            component_count,
            offset: self.stride,
        });
        self.stride = (self.stride + component_count * 4 + 3) & !3;
        self
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Bytes per vertex
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn floats_per_vertex(&self) -> usize {
        (self.stride / 4) as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedVertexArray {
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
}

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub layout: VertexLayout,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Index into the owning model's materials
    pub material: Option<usize>,

    vertex_offset: u32,
    index_offset: u32,
    vertex_arrays: Vec<CachedVertexArray>,
}

impl Mesh {
    /// # Panics
    ///
    /// Panics if `vertices` is not a whole number of vertices for `layout`.
    pub fn new(name: &str, layout: VertexLayout, vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        let floats = layout.floats_per_vertex();
        assert!(
            floats > 0 && vertices.len() % floats == 0,
            "mesh '{name}': {} floats do not split into vertices of {floats}",
            vertices.len()
        );
        Self {
            name: name.to_string(),
            layout,
            vertices,
            indices,
            material: None,
            vertex_offset: 0,
            index_offset: 0,
            vertex_arrays: Vec::new(),
        }
    }

    pub fn with_material(mut self, material: usize) -> Self {
        self.material = Some(material);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.layout.floats_per_vertex()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Byte offset of this mesh in the model's vertex buffer
    pub fn vertex_offset(&self) -> u32 {
        self.vertex_offset
    }

    /// Byte offset of this mesh in the model's index buffer
    pub fn index_offset(&self) -> u32 {
        self.index_offset
    }

    /// Number of programs a vertex array has been built for
    pub fn cached_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Vertex array wiring this mesh to `program`, built on first use.
    ///
    /// For every active input of the program the layout attribute at the same
    /// location is bound, sourced from `vertex_buffer` at the mesh's vertex
    /// offset. Layout attributes the program doesn't read are left unbound.
    ///
    /// # Panics
    ///
    /// Panics if the program reads a location the mesh layout doesn't have.
    pub fn resolve_vertex_array<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        program: &ShaderProgram,
        vertex_buffer: &GraphicsBuffer,
        index_buffer: &GraphicsBuffer,
    ) -> DeviceResult<VertexArrayHandle> {
        if let Some(cached) = self
            .vertex_arrays
            .iter()
            .find(|cached| cached.program == program.handle())
        {
            return Ok(cached.vertex_array);
        }

        let vertex_array = device.create_vertex_array()?;
        device.bind_vertex_array(Some(vertex_array));
        vertex_buffer.bind(device);
        index_buffer.bind(device);

        for input in program.inputs() {
            let Some(attribute) = self.layout.attribute(input.location) else {
                panic!(
                    "mesh '{}' has no vertex attribute at location {} read by program '{}'",
                    self.name,
                    input.location,
                    program.name()
                );
            };
            device.vertex_attribute(
                input.location,
                attribute.component_count,
                self.layout.stride(),
                self.vertex_offset + attribute.offset,
            );
        }

        // Unbind the vertex array first so it keeps its element buffer
        device.bind_vertex_array(None);
        vertex_buffer.unbind(device);
        index_buffer.unbind(device);

        log::debug!(
            "Built vertex array {:?} for mesh '{}' and program '{}'",
            vertex_array,
            self.name,
            program.name()
        );
        self.vertex_arrays.push(CachedVertexArray {
            program: program.handle(),
            vertex_array,
        });
        Ok(vertex_array)
    }

    fn release_vertex_arrays<D: GraphicsDevice>(&mut self, device: &mut D) {
        for cached in self.vertex_arrays.drain(..) {
            device.delete_vertex_array(cached.vertex_array);
        }
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) {
        self.vertices.extend_from_slice(&position.to_array());
        self.vertices.extend_from_slice(&normal.to_array());
        self.vertices.extend_from_slice(&uv.to_array());
    }

    fn empty_standard(name: &str) -> Self {
        Self::new(name, VertexLayout::standard(), Vec::new(), Vec::new())
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = Self::empty_standard("cube");

        let faces = [
            // Front face
            (Vec3::new(-0.5, -0.5, 0.5), Vec3::Z, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.5), Vec3::Z, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::Z, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, 0.5), Vec3::Z, Vec2::new(0.0, 0.0)),
            // Back face
            (Vec3::new(0.5, -0.5, -0.5), -Vec3::Z, Vec2::new(0.0, 1.0)),
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::Z, Vec2::new(1.0, 1.0)),
            (Vec3::new(-0.5, 0.5, -0.5), -Vec3::Z, Vec2::new(1.0, 0.0)),
            (Vec3::new(0.5, 0.5, -0.5), -Vec3::Z, Vec2::new(0.0, 0.0)),
            // Right face
            (Vec3::new(0.5, -0.5, 0.5), Vec3::X, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, -0.5), Vec3::X, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, -0.5), Vec3::X, Vec2::new(1.0, 0.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::X, Vec2::new(0.0, 0.0)),
            // Left face
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::X, Vec2::new(0.0, 1.0)),
            (Vec3::new(-0.5, -0.5, 0.5), -Vec3::X, Vec2::new(1.0, 1.0)),
            (Vec3::new(-0.5, 0.5, 0.5), -Vec3::X, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, -0.5), -Vec3::X, Vec2::new(0.0, 0.0)),
            // Top face
            (Vec3::new(-0.5, 0.5, 0.5), Vec3::Y, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::Y, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, -0.5), Vec3::Y, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, -0.5), Vec3::Y, Vec2::new(0.0, 0.0)),
            // Bottom face
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::Y, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, -0.5), -Vec3::Y, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.5), -Vec3::Y, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, -0.5, 0.5), -Vec3::Y, Vec2::new(0.0, 0.0)),
        ];
        for (position, normal, uv) in faces {
            mesh.push_vertex(position, normal, uv);
        }

        for face in 0..6 {
            let base = face * 4;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Create a UV sphere of diameter 1
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = Self::empty_standard("sphere");

        let segment_angle = 2.0 * std::f32::consts::PI / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                mesh.push_vertex(
                    Vec3::new(x, y, z) * 0.5,
                    Vec3::new(x, y, z).normalize_or_zero(),
                    Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32),
                );
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Create a plane on the XZ axis
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = Self::empty_standard("plane");

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                mesh.push_vertex(
                    Vec3::new(-half_width + x as f32 * step_x, 0.0, -half_depth + z as f32 * step_z),
                    Vec3::Y,
                    Vec2::new(x as f32 / subdivisions as f32, z as f32 / subdivisions as f32),
                );
            }
        }

        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Two triangles covering clip space, facing +Z
    pub fn quad() -> Self {
        let mut mesh = Self::empty_standard("quad");
        mesh.push_vertex(Vec3::new(-1.0, -1.0, 0.0), Vec3::Z, Vec2::new(0.0, 0.0));
        mesh.push_vertex(Vec3::new(1.0, -1.0, 0.0), Vec3::Z, Vec2::new(1.0, 0.0));
        mesh.push_vertex(Vec3::new(1.0, 1.0, 0.0), Vec3::Z, Vec2::new(1.0, 1.0));
        mesh.push_vertex(Vec3::new(-1.0, 1.0, 0.0), Vec3::Z, Vec2::new(0.0, 1.0));
        mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
        mesh
    }
}

/// Meshes sharing one vertex buffer and one index buffer, plus their materials
#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    vertex_buffer: GraphicsBuffer,
    index_buffer: GraphicsBuffer,
}

impl Model {
    /// Pack every mesh into shared buffers and upload them.
    pub fn upload<D: GraphicsDevice>(
        device: &mut D,
        name: &str,
        mut meshes: Vec<Mesh>,
        materials: Vec<Material>,
    ) -> DeviceResult<Self> {
        let mut vertex_bytes = Vec::new();
        let mut index_bytes = Vec::new();
        for mesh in &mut meshes {
            mesh.vertex_offset = vertex_bytes.len() as u32;
            mesh.index_offset = index_bytes.len() as u32;
            vertex_bytes.extend_from_slice(mesh.vertex_bytes());
            index_bytes.extend_from_slice(mesh.index_bytes());

            if let Some(material) = mesh.material {
                if material >= materials.len() {
                    log::warn!(
                        "Mesh '{}' of model '{}' refers to missing material {}",
                        mesh.name,
                        name,
                        material
                    );
                    mesh.material = None;
                }
            }
        }

        let vertex_buffer = GraphicsBuffer::with_data(device, BufferKind::Vertex, &vertex_bytes)?;
        let index_buffer = GraphicsBuffer::with_data(device, BufferKind::Index, &index_bytes)?;
        log::debug!(
            "Uploaded model '{}': {} meshes, {} vertex bytes, {} index bytes",
            name,
            meshes.len(),
            vertex_bytes.len(),
            index_bytes.len()
        );

        Ok(Self {
            name: name.to_string(),
            meshes,
            materials,
            vertex_buffer,
            index_buffer,
        })
    }

    pub fn vertex_buffer(&self) -> &GraphicsBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &GraphicsBuffer {
        &self.index_buffer
    }

    /// Material of a mesh, if it has one
    pub fn material(&self, mesh: usize) -> Option<&Material> {
        self.meshes[mesh]
            .material
            .and_then(|index| self.materials.get(index))
    }

    /// See [`Mesh::resolve_vertex_array`]
    pub fn resolve_vertex_array<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        mesh: usize,
        program: &ShaderProgram,
    ) -> DeviceResult<VertexArrayHandle> {
        self.meshes[mesh].resolve_vertex_array(
            device,
            program,
            &self.vertex_buffer,
            &self.index_buffer,
        )
    }

    /// Draw one mesh with the program currently in use.
    pub fn draw_mesh<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        mesh: usize,
        program: &ShaderProgram,
    ) -> DeviceResult<()> {
        let vertex_array = self.resolve_vertex_array(device, mesh, program)?;
        let mesh = &self.meshes[mesh];
        device.bind_vertex_array(Some(vertex_array));
        device.draw_indexed(mesh.index_count() as u32, IndexType::U32, mesh.index_offset());
        device.bind_vertex_array(None);
        Ok(())
    }

    /// Release buffers and every cached vertex array
    pub fn destroy<D: GraphicsDevice>(mut self, device: &mut D) {
        for mesh in &mut self.meshes {
            mesh.release_vertex_arrays(device);
        }
        self.vertex_buffer.destroy(device);
        self.index_buffer.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessDevice;
    use crate::resources::ShaderRegistry;

    /// Program reading vec3 inputs at the given locations
    fn program_source(name: &str, locations: &[u32]) -> String {
        let inputs: String = locations
            .iter()
            .map(|location| format!("layout(location = {location}) in vec3 aInput{location};\n"))
            .collect();
        let sum: Vec<String> = locations
            .iter()
            .map(|location| format!("aInput{location}"))
            .collect();
        format!(
            "#ifdef {name}
#ifdef VERTEX
{inputs}
void main()
{{
    gl_Position = vec4({}, 1.0);
}}
#endif
#ifdef FRAGMENT
layout(location = 0) out vec4 oColor;
void main()
{{
    oColor = vec4(1.0);
}}
#endif
#endif
",
            sum.join(" + ")
        )
    }

    #[test]
    fn test_standard_layout() {
        let layout = VertexLayout::standard();
        assert_eq!(layout.stride(), 32);
        assert_eq!(layout.attribute(locations::TEXCOORD).unwrap().offset, 24);
        assert!(layout.attribute(locations::TANGENT).is_none());
    }

    #[test]
    fn test_upload_records_offsets() {
        let mut device = HeadlessDevice::new();
        let model = Model::upload(
            &mut device,
            "pair",
            vec![Mesh::quad(), Mesh::cube()],
            Vec::new(),
        )
        .unwrap();

        assert_eq!(model.meshes[0].vertex_offset(), 0);
        assert_eq!(model.meshes[1].vertex_offset(), 4 * 32);
        assert_eq!(model.meshes[1].index_offset(), 6 * 4);
        assert_eq!(model.vertex_buffer().capacity(), (4 + 24) * 32);
    }

    #[test]
    fn test_vertex_array_binds_program_inputs_only() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let id = registry.load_source(&mut device, "TWO_INPUTS", &program_source("TWO_INPUTS", &[0, 1]));
        let mut model =
            Model::upload(&mut device, "quad", vec![Mesh::quad()], Vec::new()).unwrap();

        let vertex_array = model
            .resolve_vertex_array(&mut device, 0, registry.get(id))
            .unwrap();

        let attributes = device.vertex_array_attributes(vertex_array).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[1].location, 1);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[1].stride, 32);
        assert_eq!(attributes[0].buffer, model.vertex_buffer().handle());
    }

    #[test]
    fn test_vertex_array_applies_mesh_offset() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let id = registry.load_source(&mut device, "ALL", &program_source("ALL", &[0, 1]));
        let mut model = Model::upload(
            &mut device,
            "pair",
            vec![Mesh::quad(), Mesh::cube()],
            Vec::new(),
        )
        .unwrap();

        let vertex_array = model
            .resolve_vertex_array(&mut device, 1, registry.get(id))
            .unwrap();

        let attributes = device.vertex_array_attributes(vertex_array).unwrap();
        assert_eq!(attributes[0].offset, 4 * 32);
        assert_eq!(attributes[1].offset, 4 * 32 + 12);
    }

    #[test]
    fn test_vertex_array_is_cached_per_program() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let first = registry.load_source(&mut device, "FIRST", &program_source("FIRST", &[0]));
        let second = registry.load_source(&mut device, "SECOND", &program_source("SECOND", &[0, 1]));
        let mut model =
            Model::upload(&mut device, "quad", vec![Mesh::quad()], Vec::new()).unwrap();

        let a = model
            .resolve_vertex_array(&mut device, 0, registry.get(first))
            .unwrap();
        let b = model
            .resolve_vertex_array(&mut device, 0, registry.get(first))
            .unwrap();
        let c = model
            .resolve_vertex_array(&mut device, 0, registry.get(second))
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(device.stats().vertex_arrays_created, 2);
        assert_eq!(model.meshes[0].cached_vertex_arrays(), 2);
    }

    #[test]
    #[should_panic(expected = "no vertex attribute at location 3")]
    fn test_missing_location_panics() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let id = registry.load_source(&mut device, "TANGENTS", &program_source("TANGENTS", &[0, 3]));
        let mut model =
            Model::upload(&mut device, "quad", vec![Mesh::quad()], Vec::new()).unwrap();

        let _ = model.resolve_vertex_array(&mut device, 0, registry.get(id));
    }

    #[test]
    fn test_destroy_releases_vertex_arrays() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let id = registry.load_source(&mut device, "POS", &program_source("POS", &[0]));
        let mut model =
            Model::upload(&mut device, "cube", vec![Mesh::cube()], Vec::new()).unwrap();
        model.draw_mesh(&mut device, 0, registry.get(id)).unwrap();

        assert_eq!(device.live_vertex_arrays(), 1);
        assert_eq!(device.draws()[0].index_count, 36);
        model.destroy(&mut device);
        assert_eq!(device.live_vertex_arrays(), 0);
    }
}
