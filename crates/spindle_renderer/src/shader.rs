//! Shader program unit: compile, link and resolve named bindings.

use thiserror::Error;

use crate::backend::{GpuBackend, ShaderStage};

/// Attribute and uniform names shared between the CPU lookups and the GLSL text.
pub mod names {
    pub const POSITION: &str = "vPosition";
    pub const TEX_COORD: &str = "aTexCoord";
    pub const MVP_MATRIX: &str = "uMVPMatrix";
    pub const COLOR: &str = "vColor";
    pub const TEXTURE: &str = "uTexture";
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("program failed to link: {log}")]
    Link { log: String },

    #[error("attribute `{name}` is not active in the linked program")]
    MissingAttribute { name: &'static str },

    #[error("uniform `{name}` is not active in the linked program")]
    MissingUniform { name: &'static str },

    #[error("GPU refused to create a shader object: {0}")]
    Backend(String),
}

/// A vertex + fragment pair, kept together with a version tag so sources can
/// be swapped and tested independently of the code that compiles them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    pub name: &'static str,
    pub version: u32,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

/// Flat colour, position only.
pub const SOLID_COLOR: ShaderSource = ShaderSource {
    name: "solid_color",
    version: 1,
    vertex: "\
uniform mat4 uMVPMatrix;
attribute vec4 vPosition;
void main() {
    gl_Position = uMVPMatrix * vPosition;
}
",
    fragment: "\
precision mediump float;
uniform vec4 vColor;
void main() {
    gl_FragColor = vColor;
}
",
};

/// Texture sampled at per-vertex coordinates, tinted by a colour.
pub const TEXTURED: ShaderSource = ShaderSource {
    name: "textured",
    version: 1,
    vertex: "\
uniform mat4 uMVPMatrix;
attribute vec4 vPosition;
attribute vec2 aTexCoord;
varying vec2 vTexCoord;
void main() {
    vTexCoord = aTexCoord;
    gl_Position = uMVPMatrix * vPosition;
}
",
    fragment: "\
precision mediump float;
uniform sampler2D uTexture;
uniform vec4 vColor;
varying vec2 vTexCoord;
void main() {
    gl_FragColor = texture2D(uTexture, vTexCoord) * vColor;
}
",
};

/// Compiles one stage. On failure the shader object is deleted before returning.
pub fn compile<B: GpuBackend>(
    gpu: &mut B,
    source: &str,
    stage: ShaderStage,
) -> Result<B::Shader, ShaderError> {
    let shader = gpu.create_shader(stage).map_err(ShaderError::Backend)?;
    gpu.shader_source(shader, source);
    gpu.compile_shader(shader);

    if !gpu.shader_compile_status(shader) {
        let log = gpu.shader_info_log(shader);
        gpu.delete_shader(shader);
        return Err(ShaderError::Compile { stage, log });
    }

    Ok(shader)
}

/// Links a compiled pair. On failure the program object is deleted; the
/// shaders remain owned by the caller.
pub fn link<B: GpuBackend>(
    gpu: &mut B,
    vertex: B::Shader,
    fragment: B::Shader,
) -> Result<B::Program, ShaderError> {
    let program = gpu.create_program().map_err(ShaderError::Backend)?;
    gpu.attach_shader(program, vertex);
    gpu.attach_shader(program, fragment);
    gpu.link_program(program);

    if !gpu.program_link_status(program) {
        let log = gpu.program_info_log(program);
        gpu.delete_program(program);
        return Err(ShaderError::Link { log });
    }

    Ok(program)
}

/// Which optional bindings a program must expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingLayout {
    pub tex_coord: bool,
    pub texture: bool,
}

impl BindingLayout {
    pub const POSITION_ONLY: Self = Self {
        tex_coord: false,
        texture: false,
    };
    pub const TEXTURED: Self = Self {
        tex_coord: true,
        texture: true,
    };
}

/// Locations resolved once after linking and reused every frame.
///
/// Only valid while the owning program is alive.
#[derive(Clone, Debug)]
pub struct ProgramBindings<L> {
    pub position: u32,
    pub tex_coord: Option<u32>,
    pub mvp_matrix: L,
    pub color: L,
    pub texture: Option<L>,
}

fn attribute<B: GpuBackend>(
    gpu: &mut B,
    program: B::Program,
    name: &'static str,
) -> Result<u32, ShaderError> {
    gpu.attrib_location(program, name)
        .ok_or(ShaderError::MissingAttribute { name })
}

fn uniform<B: GpuBackend>(
    gpu: &mut B,
    program: B::Program,
    name: &'static str,
) -> Result<B::UniformLocation, ShaderError> {
    gpu.uniform_location(program, name)
        .ok_or(ShaderError::MissingUniform { name })
}

impl<L> ProgramBindings<L> {
    fn resolve<B>(gpu: &mut B, program: B::Program, layout: BindingLayout) -> Result<Self, ShaderError>
    where
        B: GpuBackend<UniformLocation = L>,
    {
        let tex_coord = if layout.tex_coord {
            Some(attribute(gpu, program, names::TEX_COORD)?)
        } else {
            None
        };
        let texture = if layout.texture {
            Some(uniform(gpu, program, names::TEXTURE)?)
        } else {
            None
        };

        Ok(Self {
            position: attribute(gpu, program, names::POSITION)?,
            tex_coord,
            mvp_matrix: uniform(gpu, program, names::MVP_MATRIX)?,
            color: uniform(gpu, program, names::COLOR)?,
            texture,
        })
    }
}

/// A linked GPU program plus its cached bindings.
pub struct ShaderProgram<B: GpuBackend> {
    name: &'static str,
    program: B::Program,
    bindings: ProgramBindings<B::UniformLocation>,
}

impl<B: GpuBackend> std::fmt::Debug for ShaderProgram<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("name", &self.name)
            .field("program", &self.program)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<B: GpuBackend> ShaderProgram<B> {
    /// Compiles, links and resolves `layout`. Any handle created along the way
    /// is released before an error is returned.
    pub fn new(
        gpu: &mut B,
        source: &ShaderSource,
        layout: BindingLayout,
    ) -> Result<Self, ShaderError> {
        let vertex = compile(gpu, source.vertex, ShaderStage::Vertex)?;
        let fragment = match compile(gpu, source.fragment, ShaderStage::Fragment) {
            Ok(fragment) => fragment,
            Err(err) => {
                gpu.delete_shader(vertex);
                return Err(err);
            }
        };

        let linked = link(gpu, vertex, fragment);

        // The program keeps the binary; the shader objects are no longer needed.
        if let Ok(program) = linked {
            gpu.detach_shader(program, vertex);
            gpu.detach_shader(program, fragment);
        }
        gpu.delete_shader(vertex);
        gpu.delete_shader(fragment);
        let program = linked?;

        let bindings = match ProgramBindings::resolve(gpu, program, layout) {
            Ok(bindings) => bindings,
            Err(err) => {
                gpu.delete_program(program);
                return Err(err);
            }
        };

        log::info!(
            "linked shader program '{}' v{} ({:?})",
            source.name,
            source.version,
            program
        );

        Ok(Self {
            name: source.name,
            program,
            bindings,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handle(&self) -> B::Program {
        self.program
    }

    pub fn bindings(&self) -> &ProgramBindings<B::UniformLocation> {
        &self.bindings
    }

    pub fn activate(&self, gpu: &mut B) {
        gpu.use_program(Some(self.program));
    }

    pub fn release(self, gpu: &mut B) {
        log::debug!("deleting shader program '{}'", self.name);
        gpu.delete_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCall, ObjectKind, RecordingGpu};

    const BROKEN: ShaderSource = ShaderSource {
        name: "broken",
        version: 1,
        vertex: SOLID_COLOR.vertex,
        fragment: "void main() {\n#error unterminated\n",
    };

    #[test]
    fn solid_program_resolves_bindings() {
        let mut gpu = RecordingGpu::new();
        let program =
            ShaderProgram::new(&mut gpu, &SOLID_COLOR, BindingLayout::POSITION_ONLY).unwrap();

        assert_eq!(program.name(), "solid_color");
        assert_eq!(program.bindings().position, 0);
        assert!(program.bindings().tex_coord.is_none());
        assert!(program.bindings().texture.is_none());
        assert_ne!(program.bindings().mvp_matrix, program.bindings().color);

        // Only the program survives; both shader objects were deleted.
        assert_eq!(gpu.live_handles(), 1);
    }

    #[test]
    fn textured_program_resolves_texture_bindings() {
        let mut gpu = RecordingGpu::new();
        let program = ShaderProgram::new(&mut gpu, &TEXTURED, BindingLayout::TEXTURED).unwrap();

        assert_eq!(program.bindings().position, 0);
        assert_eq!(program.bindings().tex_coord, Some(1));
        assert!(program.bindings().texture.is_some());
    }

    #[test]
    fn compile_error_leaks_nothing() {
        let mut gpu = RecordingGpu::new();
        let err = ShaderProgram::new(&mut gpu, &BROKEN, BindingLayout::POSITION_ONLY).unwrap_err();

        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("ERROR: 0:2"));
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(gpu.live_handles(), 0);
        assert!(!gpu.calls().iter().any(|call| matches!(call, GpuCall::CreateProgram { .. })));
    }

    #[test]
    fn compile_deletes_its_own_shader() {
        let mut gpu = RecordingGpu::new();
        let err = compile(&mut gpu, "", ShaderStage::Vertex).unwrap_err();

        assert!(matches!(err, ShaderError::Compile { stage: ShaderStage::Vertex, .. }));
        assert_eq!(gpu.live_handles(), 0);
    }

    #[test]
    fn link_error_leaks_nothing() {
        let mut gpu = RecordingGpu::new();
        gpu.fail_next_link("L0001: varying mismatch");
        let err = ShaderProgram::new(&mut gpu, &SOLID_COLOR, BindingLayout::POSITION_ONLY)
            .unwrap_err();

        match err {
            ShaderError::Link { log } => assert_eq!(log, "L0001: varying mismatch"),
            other => panic!("expected link error, got {other:?}"),
        }
        assert_eq!(gpu.live_handles(), 0);
    }

    #[test]
    fn refused_objects_are_backend_errors_without_leaks() {
        // First shader, second shader, then the program.
        let failures = [
            (ObjectKind::Shader, 0),
            (ObjectKind::Shader, 1),
            (ObjectKind::Program, 0),
        ];
        for (kind, skip) in failures {
            let mut gpu = RecordingGpu::new();
            gpu.fail_create_after(kind, skip);

            let err = ShaderProgram::new(&mut gpu, &TEXTURED, BindingLayout::TEXTURED).unwrap_err();
            assert!(matches!(err, ShaderError::Backend(_)), "{kind:?}/{skip}: {err:?}");
            assert_eq!(gpu.live_handles(), 0, "{kind:?}/{skip}");
        }
    }

    #[test]
    fn renamed_uniform_fails_fast() {
        let renamed = ShaderSource {
            name: "renamed",
            version: 2,
            vertex: "uniform mat4 uTransform;\nattribute vec4 vPosition;\nvoid main() {}",
            fragment: SOLID_COLOR.fragment,
        };

        let mut gpu = RecordingGpu::new();
        let err = ShaderProgram::new(&mut gpu, &renamed, BindingLayout::POSITION_ONLY).unwrap_err();

        assert!(matches!(err, ShaderError::MissingUniform { name: "uMVPMatrix" }));
        assert_eq!(gpu.live_handles(), 0);
    }

    #[test]
    fn textured_layout_on_solid_source_is_rejected() {
        let mut gpu = RecordingGpu::new();
        let err = ShaderProgram::new(&mut gpu, &SOLID_COLOR, BindingLayout::TEXTURED).unwrap_err();

        assert!(matches!(err, ShaderError::MissingAttribute { name: "aTexCoord" }));
        assert_eq!(gpu.live_handles(), 0);
    }

    #[test]
    fn release_deletes_program() {
        let mut gpu = RecordingGpu::new();
        let program =
            ShaderProgram::new(&mut gpu, &SOLID_COLOR, BindingLayout::POSITION_ONLY).unwrap();
        let handle = program.handle();

        program.release(&mut gpu);

        assert_eq!(gpu.live_handles(), 0);
        assert_eq!(gpu.calls().last(), Some(&GpuCall::DeleteProgram { program: handle }));
    }
}
