//! Shader program registry with hot reload
//!
//! Each program is built from one combined GLSL source. Both stages are
//! produced from that source by prepending the version directive, a define
//! naming the program and a `VERTEX` or `FRAGMENT` define, so one file can host
//! several programs guarded by `#ifdef`.
//!
//! Programs loaded from disk remember the file's modification time. Polling
//! [`ShaderRegistry::hot_reload`] rebuilds every program whose file changed,
//! swapping the new build in only when it links.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::backend::{GraphicsDevice, ProgramBuild, ProgramHandle, ProgramSources, ShaderInput, ShaderStage};

/// Stable index of a program in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(usize);

impl ProgramId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A built program and where it came from
#[derive(Debug)]
pub struct ShaderProgram {
    name: String,
    path: Option<PathBuf>,
    handle: ProgramHandle,
    inputs: Vec<ShaderInput>,
    linked: bool,
    modified: Option<SystemTime>,
}

impl ShaderProgram {
    /// Program name, also the define selecting it inside its source
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Active vertex inputs, ordered by location
    pub fn inputs(&self) -> &[ShaderInput] {
        &self.inputs
    }

    /// Whether the current handle is a working program
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Source modification time seen at the last (re)build
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }
}

/// Registry owning every program the pipeline uses
#[derive(Debug)]
pub struct ShaderRegistry {
    programs: Vec<ShaderProgram>,
    version: String,
}

impl ShaderRegistry {
    /// Oldest GLSL dialect the shipped shaders are written against
    pub const DEFAULT_VERSION: &'static str = "#version 450 core";

    pub fn new() -> Self {
        Self::with_version(Self::DEFAULT_VERSION)
    }

    /// Use a different version directive; an empty string omits it.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            programs: Vec::new(),
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Source handed to the compiler for one stage of program `name`
    pub fn compose(&self, source: &str, name: &str, stage: ShaderStage) -> String {
        let mut composed = String::with_capacity(source.len() + self.version.len() + 64);
        if !self.version.is_empty() {
            composed.push_str(&self.version);
            composed.push('\n');
        }
        composed.push_str(&format!("#define {name}\n#define {}\n", stage.define()));
        composed.push_str(source);
        composed
    }

    /// Load program `name` from a file.
    ///
    /// A missing file or a failed build is logged, not returned: the program
    /// is registered with a non-functional handle and picked up again by
    /// [`ShaderRegistry::hot_reload`] once the file is fixed.
    pub fn load<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        path: impl AsRef<Path>,
        name: &str,
    ) -> ProgramId {
        let path = path.as_ref().to_path_buf();
        let modified = modified_time(&path);
        let source = read_source(&path);
        let (build, inputs) = self.build(device, name, &source);

        self.register(ShaderProgram {
            name: name.to_string(),
            path: Some(path),
            handle: build.handle,
            linked: build.is_linked(),
            inputs,
            modified,
        })
    }

    /// Build program `name` from an in-memory source. Such programs are never
    /// hot reloaded.
    pub fn load_source<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        name: &str,
        source: &str,
    ) -> ProgramId {
        let (build, inputs) = self.build(device, name, source);

        self.register(ShaderProgram {
            name: name.to_string(),
            path: None,
            handle: build.handle,
            linked: build.is_linked(),
            inputs,
            modified: None,
        })
    }

    /// Rebuild every file-backed program whose source changed since its last
    /// build and return how many were rebuilt.
    ///
    /// A rebuild that links replaces the program's handle and inputs and
    /// releases the old handle. A rebuild that fails is released and the old
    /// handle stays in use. Either way the new timestamp is recorded, so a
    /// broken file is not retried until it changes again.
    pub fn hot_reload<D: GraphicsDevice>(&mut self, device: &mut D) -> usize {
        let mut rebuilt = 0;

        for index in 0..self.programs.len() {
            let program = &self.programs[index];
            let Some(path) = program.path.clone() else {
                continue;
            };
            let current = modified_time(&path);
            let changed = match (current, program.modified) {
                (Some(now), Some(before)) => now > before,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !changed {
                continue;
            }

            let name = program.name.clone();
            let source = read_source(&path);
            let (build, inputs) = self.build(device, &name, &source);

            let program = &mut self.programs[index];
            program.modified = current;
            if build.is_linked() {
                device.delete_program(program.handle);
                program.handle = build.handle;
                program.inputs = inputs;
                program.linked = true;
                log::info!("Reloaded program '{}' from {}", name, path.display());
            } else {
                device.delete_program(build.handle);
                log::warn!("Keeping previous build of program '{name}'");
            }
            rebuilt += 1;
        }

        rebuilt
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by another registry.
    pub fn get(&self, id: ProgramId) -> &ShaderProgram {
        &self.programs[id.0]
    }

    pub fn find(&self, name: &str) -> Option<ProgramId> {
        self.programs
            .iter()
            .position(|program| program.name == name)
            .map(ProgramId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProgramId, &ShaderProgram)> {
        self.programs
            .iter()
            .enumerate()
            .map(|(index, program)| (ProgramId(index), program))
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Release every program
    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        for program in self.programs {
            device.delete_program(program.handle);
        }
    }

    fn register(&mut self, program: ShaderProgram) -> ProgramId {
        log::debug!(
            "Registered program '{}' (linked: {}, inputs: {:?})",
            program.name,
            program.linked,
            program.inputs
        );
        self.programs.push(program);
        ProgramId(self.programs.len() - 1)
    }

    fn build<D: GraphicsDevice>(
        &self,
        device: &mut D,
        name: &str,
        source: &str,
    ) -> (ProgramBuild, Vec<ShaderInput>) {
        let vertex = self.compose(source, name, ShaderStage::Vertex);
        let fragment = self.compose(source, name, ShaderStage::Fragment);
        let build = device.build_program(&ProgramSources {
            label: name,
            vertex: &vertex,
            fragment: &fragment,
        });

        for diagnostic in &build.diagnostics {
            log::error!("Program '{name}' failed to build: {diagnostic}");
        }
        let inputs = if build.is_linked() {
            device.active_attributes(build.handle)
        } else {
            Vec::new()
        };
        (build, inputs)
    }
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            log::error!("Failed to read shader {}: {err}", path.display());
            String::new()
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessDevice;

    const PASSTHROUGH: &str = "
#ifdef PASSTHROUGH
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
layout(location = 1) in vec3 aNormal;
layout(location = 0) out vec3 vNormal;
void main()
{
    vNormal = aNormal;
    gl_Position = vec4(aPosition, 1.0);
}
#endif
#ifdef FRAGMENT
layout(location = 0) in vec3 vNormal;
layout(location = 0) out vec4 oColor;
void main()
{
    oColor = vec4(vNormal, 1.0);
}
#endif
#endif
";

    #[test]
    fn test_compose_prepends_defines() {
        let registry = ShaderRegistry::new();
        let composed = registry.compose("void main() {}", "GEOMETRY_PASS", ShaderStage::Fragment);
        assert_eq!(
            composed,
            "#version 450 core\n#define GEOMETRY_PASS\n#define FRAGMENT\nvoid main() {}"
        );

        let bare = ShaderRegistry::with_version("");
        assert!(bare
            .compose("", "X", ShaderStage::Vertex)
            .starts_with("#define X\n#define VERTEX\n"));
    }

    #[test]
    fn test_load_source_reflects_inputs() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let id = registry.load_source(&mut device, "PASSTHROUGH", PASSTHROUGH);

        let program = registry.get(id);
        assert!(program.is_linked());
        assert_eq!(
            program
                .inputs()
                .iter()
                .map(|input| (input.location, input.component_count))
                .collect::<Vec<_>>(),
            vec![(0, 3), (1, 3)]
        );
        assert_eq!(registry.find("PASSTHROUGH"), Some(id));
    }

    #[test]
    fn test_unknown_name_yields_broken_program() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let id = registry.load_source(&mut device, "SOMETHING_ELSE", PASSTHROUGH);

        let program = registry.get(id);
        assert!(!program.is_linked());
        assert!(program.inputs().is_empty());
        assert!(device.is_program_alive(program.handle()));
    }

    #[test]
    fn test_missing_file_registers_broken_program() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new();
        let id = registry.load(&mut device, "/nonexistent/shader.glsl", "PASSTHROUGH");

        assert!(!registry.get(id).is_linked());
        assert_eq!(registry.get(id).modified(), None);
        assert_eq!(registry.hot_reload(&mut device), 0);
    }
}
