use std::collections::{HashMap, HashSet};

use super::{BufferTarget, GpuBackend, PrimitiveMode, ShaderStage, SurfaceState, TextureFilter};

/// Source text containing this marker is rejected by the fake compiler.
pub const COMPILE_ERROR_MARKER: &str = "#error";

/// One call made against a [`RecordingGpu`], in the order it was made.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    CreateShader { shader: u32, stage: ShaderStage },
    ShaderSource { shader: u32 },
    CompileShader { shader: u32 },
    DeleteShader { shader: u32 },
    CreateProgram { program: u32 },
    AttachShader { program: u32, shader: u32 },
    DetachShader { program: u32, shader: u32 },
    LinkProgram { program: u32 },
    DeleteProgram { program: u32 },
    UseProgram { program: Option<u32> },
    CreateBuffer { buffer: u32 },
    BindBuffer { target: BufferTarget, buffer: Option<u32> },
    BufferData { target: BufferTarget, len: usize },
    DeleteBuffer { buffer: u32 },
    EnableVertexAttribArray { index: u32 },
    VertexAttribPointer { index: u32, components: i32, offset: i32 },
    DisableVertexAttribArray { index: u32 },
    UniformMatrix4 { location: u32, matrix: [f32; 16] },
    UniformVec4 { location: u32, value: [f32; 4] },
    UniformSampler { location: u32, unit: u32 },
    CreateTexture { texture: u32 },
    BindTexture { unit: u32, texture: Option<u32> },
    TextureFilters { min: TextureFilter, mag: TextureFilter },
    TexImage { width: u32, height: u32, len: usize },
    DeleteTexture { texture: u32 },
    Viewport { width: u32, height: u32 },
    SurfaceState(SurfaceState),
    Clear,
    DrawArrays { mode: PrimitiveMode, first: i32, count: i32 },
    DrawElements { mode: PrimitiveMode, count: i32, offset: i32 },
}

/// Object kinds whose creation can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Shader,
    Program,
    Buffer,
    Texture,
}

#[derive(Debug, Default)]
struct FakeShader {
    stage: Option<ShaderStage>,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct FakeProgram {
    attached: Vec<u32>,
    linked: bool,
    log: String,
    attributes: HashMap<String, u32>,
    uniforms: HashMap<String, u32>,
}

/// In-memory [`GpuBackend`].
///
/// Records every call, tracks which handles are alive, keeps buffer contents
/// so uploads can be read back, and emulates just enough of a GLSL front end
/// to resolve `attribute` / `uniform` declarations by name.
#[derive(Debug, Default)]
pub struct RecordingGpu {
    calls: Vec<GpuCall>,
    next_handle: u32,
    next_location: u32,

    shaders: HashMap<u32, FakeShader>,
    programs: HashMap<u32, FakeProgram>,
    buffers: HashMap<u32, Vec<u8>>,
    textures: HashSet<u32>,

    bound_array: Option<u32>,
    bound_element_array: Option<u32>,

    fail_next_link: Option<String>,
    // Creations of each kind still allowed to succeed before one fails.
    fail_create: HashMap<ObjectKind, usize>,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    /// Returns and forgets the calls recorded so far.
    pub fn take_calls(&mut self) -> Vec<GpuCall> {
        std::mem::take(&mut self.calls)
    }

    /// Makes the next `link_program` fail with `log`.
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.fail_next_link = Some(log.into());
    }

    /// Makes the next creation of `kind` fail.
    pub fn fail_next_create(&mut self, kind: ObjectKind) {
        self.fail_create_after(kind, 0);
    }

    /// Lets `skip` creations of `kind` succeed, then fails the one after.
    pub fn fail_create_after(&mut self, kind: ObjectKind, skip: usize) {
        self.fail_create.insert(kind, skip);
    }

    /// Drops every object as a real driver does when the context goes away.
    /// Handle numbers keep increasing, so stale handles never alias new ones.
    pub fn lose_context(&mut self) {
        self.shaders.clear();
        self.programs.clear();
        self.buffers.clear();
        self.textures.clear();
        self.bound_array = None;
        self.bound_element_array = None;
    }

    /// Number of shaders, programs, buffers and textures not yet deleted.
    pub fn live_handles(&self) -> usize {
        self.shaders.len() + self.programs.len() + self.buffers.len() + self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_contents(&self, buffer: u32) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn draw_call_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    GpuCall::DrawArrays { .. } | GpuCall::DrawElements { .. }
                )
            })
            .count()
    }

    fn check_create(&mut self, kind: ObjectKind) -> Result<(), String> {
        match self.fail_create.get_mut(&kind) {
            Some(0) => {
                self.fail_create.remove(&kind);
                Err(format!("GL_OUT_OF_MEMORY creating {kind:?}"))
            }
            Some(skip) => {
                *skip -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn alloc_handle(&mut self) -> u32 {
        // Zero is never a valid GL object name.
        self.next_handle += 1;
        self.next_handle
    }

    fn alloc_location(&mut self) -> u32 {
        let location = self.next_location;
        self.next_location += 1;
        location
    }

    fn bound(&self, target: BufferTarget) -> Option<u32> {
        match target {
            BufferTarget::Array => self.bound_array,
            BufferTarget::ElementArray => self.bound_element_array,
        }
    }
}

/// Pulls `(qualifier, name)` pairs for `attribute` and `uniform` declarations.
fn declarations(source: &str) -> impl Iterator<Item = (&str, &str)> {
    source.lines().filter_map(|line| {
        let line = line.trim();
        let qualifier = line.split_whitespace().next()?;
        if qualifier != "attribute" && qualifier != "uniform" {
            return None;
        }
        let name = line
            .trim_end_matches(';')
            .split_whitespace()
            .last()?
            .trim_end_matches(';');
        Some((qualifier, name))
    })
}

impl GpuBackend for RecordingGpu {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Texture = u32;
    type UniformLocation = u32;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<u32, String> {
        self.check_create(ObjectKind::Shader)?;
        let shader = self.alloc_handle();
        self.shaders.insert(
            shader,
            FakeShader {
                stage: Some(stage),
                ..FakeShader::default()
            },
        );
        self.calls.push(GpuCall::CreateShader { shader, stage });
        Ok(shader)
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        if let Some(fake) = self.shaders.get_mut(&shader) {
            fake.source = source.to_owned();
        }
        self.calls.push(GpuCall::ShaderSource { shader });
    }

    fn compile_shader(&mut self, shader: u32) {
        if let Some(fake) = self.shaders.get_mut(&shader) {
            if fake.source.trim().is_empty() {
                fake.compiled = false;
                fake.log = "ERROR: 0:1: '' : empty shader source".to_owned();
            } else if let Some(line) = fake
                .source
                .lines()
                .position(|line| line.contains(COMPILE_ERROR_MARKER))
            {
                fake.compiled = false;
                fake.log = format!(
                    "ERROR: 0:{}: '{}' : compilation terminated",
                    line + 1,
                    COMPILE_ERROR_MARKER
                );
            } else {
                fake.compiled = true;
                fake.log.clear();
            }
        }
        self.calls.push(GpuCall::CompileShader { shader });
    }

    fn shader_compile_status(&mut self, shader: u32) -> bool {
        self.shaders.get(&shader).is_some_and(|fake| fake.compiled)
    }

    fn shader_info_log(&mut self, shader: u32) -> String {
        self.shaders
            .get(&shader)
            .map(|fake| fake.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: u32) {
        self.shaders.remove(&shader);
        self.calls.push(GpuCall::DeleteShader { shader });
    }

    fn create_program(&mut self) -> Result<u32, String> {
        self.check_create(ObjectKind::Program)?;
        let program = self.alloc_handle();
        self.programs.insert(program, FakeProgram::default());
        self.calls.push(GpuCall::CreateProgram { program });
        Ok(program)
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        if let Some(fake) = self.programs.get_mut(&program) {
            fake.attached.push(shader);
        }
        self.calls.push(GpuCall::AttachShader { program, shader });
    }

    fn detach_shader(&mut self, program: u32, shader: u32) {
        if let Some(fake) = self.programs.get_mut(&program) {
            fake.attached.retain(|&attached| attached != shader);
        }
        self.calls.push(GpuCall::DetachShader { program, shader });
    }

    fn link_program(&mut self, program: u32) {
        self.calls.push(GpuCall::LinkProgram { program });

        let Some(attached) = self.programs.get(&program).map(|fake| fake.attached.clone()) else {
            return;
        };

        let mut log = self.fail_next_link.take();
        let mut stages = Vec::new();
        let mut declared = Vec::new();
        for shader in &attached {
            match self.shaders.get(shader) {
                Some(fake) if fake.compiled => {
                    stages.extend(fake.stage);
                    declared.extend(
                        declarations(&fake.source)
                            .map(|(qualifier, name)| (qualifier.to_owned(), name.to_owned())),
                    );
                }
                _ => {
                    log.get_or_insert_with(|| format!("shader {shader} is not compiled"));
                }
            }
        }
        if log.is_none()
            && !(stages.contains(&ShaderStage::Vertex) && stages.contains(&ShaderStage::Fragment))
        {
            log = Some("a vertex and a fragment shader must be attached".to_owned());
        }

        let mut attributes = HashMap::new();
        let mut uniforms = HashMap::new();
        if log.is_none() {
            for (qualifier, name) in declared {
                if qualifier == "attribute" {
                    let next = attributes.len() as u32;
                    attributes.entry(name).or_insert(next);
                } else if !uniforms.contains_key(&name) {
                    let location = self.alloc_location();
                    uniforms.insert(name, location);
                }
            }
        }

        if let Some(fake) = self.programs.get_mut(&program) {
            fake.linked = log.is_none();
            fake.log = log.unwrap_or_default();
            fake.attributes = attributes;
            fake.uniforms = uniforms;
        }
    }

    fn program_link_status(&mut self, program: u32) -> bool {
        self.programs.get(&program).is_some_and(|fake| fake.linked)
    }

    fn program_info_log(&mut self, program: u32) -> String {
        self.programs
            .get(&program)
            .map(|fake| fake.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: u32) {
        self.programs.remove(&program);
        self.calls.push(GpuCall::DeleteProgram { program });
    }

    fn use_program(&mut self, program: Option<u32>) {
        self.calls.push(GpuCall::UseProgram { program });
    }

    fn attrib_location(&mut self, program: u32, name: &str) -> Option<u32> {
        let fake = self.programs.get(&program).filter(|fake| fake.linked)?;
        fake.attributes.get(name).copied()
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> Option<u32> {
        let fake = self.programs.get(&program).filter(|fake| fake.linked)?;
        fake.uniforms.get(name).copied()
    }

    fn create_buffer(&mut self) -> Result<u32, String> {
        self.check_create(ObjectKind::Buffer)?;
        let buffer = self.alloc_handle();
        self.buffers.insert(buffer, Vec::new());
        self.calls.push(GpuCall::CreateBuffer { buffer });
        Ok(buffer)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<u32>) {
        match target {
            BufferTarget::Array => self.bound_array = buffer,
            BufferTarget::ElementArray => self.bound_element_array = buffer,
        }
        self.calls.push(GpuCall::BindBuffer { target, buffer });
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        if let Some(contents) = self
            .bound(target)
            .and_then(|buffer| self.buffers.get_mut(&buffer))
        {
            *contents = data.to_vec();
        }
        self.calls.push(GpuCall::BufferData {
            target,
            len: data.len(),
        });
    }

    fn delete_buffer(&mut self, buffer: u32) {
        self.buffers.remove(&buffer);
        if self.bound_array == Some(buffer) {
            self.bound_array = None;
        }
        if self.bound_element_array == Some(buffer) {
            self.bound_element_array = None;
        }
        self.calls.push(GpuCall::DeleteBuffer { buffer });
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(GpuCall::EnableVertexAttribArray { index });
    }

    fn vertex_attrib_pointer_f32(&mut self, index: u32, components: i32, offset: i32) {
        self.calls.push(GpuCall::VertexAttribPointer {
            index,
            components,
            offset,
        });
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(GpuCall::DisableVertexAttribArray { index });
    }

    fn uniform_matrix4(&mut self, location: &u32, matrix: &[f32; 16]) {
        self.calls.push(GpuCall::UniformMatrix4 {
            location: *location,
            matrix: *matrix,
        });
    }

    fn uniform_vec4(&mut self, location: &u32, value: &[f32; 4]) {
        self.calls.push(GpuCall::UniformVec4 {
            location: *location,
            value: *value,
        });
    }

    fn uniform_sampler(&mut self, location: &u32, unit: u32) {
        self.calls.push(GpuCall::UniformSampler {
            location: *location,
            unit,
        });
    }

    fn create_texture(&mut self) -> Result<u32, String> {
        self.check_create(ObjectKind::Texture)?;
        let texture = self.alloc_handle();
        self.textures.insert(texture);
        self.calls.push(GpuCall::CreateTexture { texture });
        Ok(texture)
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<u32>) {
        self.calls.push(GpuCall::BindTexture { unit, texture });
    }

    fn texture_filters(&mut self, min: TextureFilter, mag: TextureFilter) {
        self.calls.push(GpuCall::TextureFilters { min, mag });
    }

    fn tex_image_rgba8(&mut self, width: u32, height: u32, pixels: &[u8]) {
        self.calls.push(GpuCall::TexImage {
            width,
            height,
            len: pixels.len(),
        });
    }

    fn delete_texture(&mut self, texture: u32) {
        self.textures.remove(&texture);
        self.calls.push(GpuCall::DeleteTexture { texture });
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.calls.push(GpuCall::Viewport { width, height });
    }

    fn apply_surface_state(&mut self, state: &SurfaceState) {
        self.calls.push(GpuCall::SurfaceState(*state));
    }

    fn clear(&mut self) {
        self.calls.push(GpuCall::Clear);
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: i32, count: i32) {
        self.calls.push(GpuCall::DrawArrays { mode, first, count });
    }

    fn draw_elements_u16(&mut self, mode: PrimitiveMode, count: i32, offset: i32) {
        self.calls.push(GpuCall::DrawElements {
            mode,
            count,
            offset,
        });
    }
}
