//! The seam between the renderer and the GPU.
//!
//! Every GPU state change the renderer makes goes through [`GpuBackend`], and
//! the backend is always passed in explicitly. [`GlowBackend`] talks to a real
//! GLES context; [`RecordingGpu`] records calls for tests and headless runs.

use std::fmt;

pub mod glow_backend;
pub mod recording;

pub use glow_backend::GlowBackend;
pub use recording::{GpuCall, ObjectKind, RecordingGpu};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attributes.
    Array,
    /// Draw-order indices.
    ElementArray,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveMode {
    Triangles,
    TriangleStrip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Fixed-function state applied once when the surface is created.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceState {
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub depth_test: bool,
}

/// The subset of OpenGL ES 2.0 the renderer needs.
///
/// Handle types are associated so a real backend can hand out driver objects
/// while a test double hands out plain integers.
pub trait GpuBackend {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + fmt::Debug;
    type Buffer: Copy + fmt::Debug;
    type Texture: Copy + fmt::Debug;
    type UniformLocation: Clone + fmt::Debug;

    // --- Shaders & programs ---
    fn create_shader(&mut self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&mut self, shader: Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: Self::Shader);
    fn shader_compile_status(&mut self, shader: Self::Shader) -> bool;
    fn shader_info_log(&mut self, shader: Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Result<Self::Program, String>;
    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn link_program(&mut self, program: Self::Program);
    fn program_link_status(&mut self, program: Self::Program) -> bool;
    fn program_info_log(&mut self, program: Self::Program) -> String;
    fn delete_program(&mut self, program: Self::Program);
    fn use_program(&mut self, program: Option<Self::Program>);

    fn attrib_location(&mut self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_location(
        &mut self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;

    // --- Buffers & vertex attributes ---
    fn create_buffer(&mut self) -> Result<Self::Buffer, String>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// Uploads `data` into the buffer bound to `target` as static draw data.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    fn enable_vertex_attrib_array(&mut self, index: u32);
    /// Points `index` at tightly packed floats in the bound array buffer.
    fn vertex_attrib_pointer_f32(&mut self, index: u32, components: i32, offset: i32);
    fn disable_vertex_attrib_array(&mut self, index: u32);

    // --- Uniforms ---
    /// Column-major, uploaded without transposing.
    fn uniform_matrix4(&mut self, location: &Self::UniformLocation, matrix: &[f32; 16]);
    fn uniform_vec4(&mut self, location: &Self::UniformLocation, value: &[f32; 4]);
    fn uniform_sampler(&mut self, location: &Self::UniformLocation, unit: u32);

    // --- Textures ---
    fn create_texture(&mut self) -> Result<Self::Texture, String>;
    /// Selects texture `unit` and binds `texture` as its 2D texture.
    fn bind_texture(&mut self, unit: u32, texture: Option<Self::Texture>);
    /// Sets filtering (clamp-to-edge wrapping) on the bound 2D texture.
    fn texture_filters(&mut self, min: TextureFilter, mag: TextureFilter);
    /// Uploads RGBA8 pixels into the bound 2D texture.
    fn tex_image_rgba8(&mut self, width: u32, height: u32, pixels: &[u8]);
    fn delete_texture(&mut self, texture: Self::Texture);

    // --- Frame state ---
    fn viewport(&mut self, width: u32, height: u32);
    fn apply_surface_state(&mut self, state: &SurfaceState);
    /// Clears the colour and depth buffers.
    fn clear(&mut self);
    fn draw_arrays(&mut self, mode: PrimitiveMode, first: i32, count: i32);
    /// Draws with `u16` indices from the bound element array buffer.
    fn draw_elements_u16(&mut self, mode: PrimitiveMode, count: i32, offset: i32);
}
