use std::rc::Rc;

use glam::Mat4;
use thiserror::Error;

use crate::{
    backend::{BufferTarget, GpuBackend, PrimitiveMode},
    geometry::{GpuGeometry, POSITION_COMPONENTS, TEX_COORD_COMPONENTS},
    shader::ShaderProgram,
    texture::GpuTexture,
};

/// How the vertices are assembled into triangles. Fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawMode {
    /// Every vertex after the second closes a triangle with the previous two.
    TriangleStrip,
    /// Triples taken from the geometry's draw-order list.
    IndexedTriangles,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrawableError {
    #[error("`{label}` is indexed but its geometry has no draw order")]
    MissingDrawOrder { label: &'static str },

    #[error("`{label}` has a texture but its geometry has no texture coordinates")]
    MissingTexCoords { label: &'static str },

    #[error("`{label}` has a texture but program `{program}` has no sampler")]
    MissingSampler {
        label: &'static str,
        program: &'static str,
    },
}

/// Everything a [`Drawable`] is assembled from.
pub struct DrawableParts<B: GpuBackend> {
    pub label: &'static str,
    pub program: Rc<ShaderProgram<B>>,
    pub geometry: GpuGeometry<B>,
    pub texture: Option<GpuTexture<B>>,
    pub mode: DrawMode,
    pub color: [f32; 4],
}

impl<B: GpuBackend> DrawableParts<B> {
    fn check(&self) -> Result<(), DrawableError> {
        let label = self.label;
        if self.mode == DrawMode::IndexedTriangles && self.geometry.index_buffer().is_none() {
            return Err(DrawableError::MissingDrawOrder { label });
        }
        if self.texture.is_some() {
            let bindings = self.program.bindings();
            if self.geometry.tex_coord_buffer().is_none() || bindings.tex_coord.is_none() {
                return Err(DrawableError::MissingTexCoords { label });
            }
            if bindings.texture.is_none() {
                return Err(DrawableError::MissingSampler {
                    label,
                    program: self.program.name(),
                });
            }
        }
        Ok(())
    }
}

/// One shape: shared program, owned geometry, optional owned texture.
pub struct Drawable<B: GpuBackend> {
    program: Rc<ShaderProgram<B>>,
    geometry: GpuGeometry<B>,
    texture: Option<GpuTexture<B>>,
    color: [f32; 4],
    mode: DrawMode,
}

impl<B: GpuBackend> Drawable<B> {
    /// Assembles a drawable. If the parts do not fit together, the geometry
    /// and texture are deleted before the error is returned.
    pub fn new(gpu: &mut B, parts: DrawableParts<B>) -> Result<Self, DrawableError> {
        if let Err(err) = parts.check() {
            parts.geometry.release(gpu);
            if let Some(texture) = parts.texture {
                texture.release(gpu);
            }
            return Err(err);
        }

        Ok(Self {
            program: parts.program,
            geometry: parts.geometry,
            texture: parts.texture,
            color: parts.color,
            mode: parts.mode,
        })
    }

    /// Issues the draw for this shape with `combined` as its transform.
    ///
    /// GPU state changes happen in a fixed order: program, vertex source,
    /// transform, colour, texture, draw, attribute teardown.
    pub fn draw(&self, gpu: &mut B, combined: &Mat4) {
        // 1. Program & its cached locations
        self.program.activate(gpu);
        let bindings = self.program.bindings();

        // 2. Vertex source
        gpu.bind_buffer(BufferTarget::Array, Some(self.geometry.position_buffer()));
        gpu.enable_vertex_attrib_array(bindings.position);
        gpu.vertex_attrib_pointer_f32(bindings.position, POSITION_COMPONENTS as i32, 0);

        let tex_coord = match (bindings.tex_coord, self.geometry.tex_coord_buffer()) {
            (Some(index), Some(buffer)) if self.texture.is_some() => {
                gpu.bind_buffer(BufferTarget::Array, Some(buffer));
                gpu.enable_vertex_attrib_array(index);
                gpu.vertex_attrib_pointer_f32(index, TEX_COORD_COMPONENTS as i32, 0);
                Some(index)
            }
            _ => None,
        };

        // 3. Uniforms
        gpu.uniform_matrix4(&bindings.mvp_matrix, &combined.to_cols_array());
        gpu.uniform_vec4(&bindings.color, &self.color);

        if let (Some(texture), Some(sampler)) = (&self.texture, &bindings.texture) {
            gpu.bind_texture(0, Some(texture.handle()));
            gpu.uniform_sampler(sampler, 0);
        }

        // 4. Draw
        match self.mode {
            DrawMode::TriangleStrip => {
                gpu.draw_arrays(PrimitiveMode::TriangleStrip, 0, self.geometry.vertex_count());
            }
            DrawMode::IndexedTriangles => {
                gpu.bind_buffer(BufferTarget::ElementArray, self.geometry.index_buffer());
                gpu.draw_elements_u16(PrimitiveMode::Triangles, self.geometry.index_count(), 0);
            }
        }

        // 5. Leave no attribute array enabled for the next drawable
        gpu.disable_vertex_attrib_array(bindings.position);
        if let Some(index) = tex_coord {
            gpu.disable_vertex_attrib_array(index);
        }
    }

    /// Deletes the geometry and texture. The program is shared and released by its owner.
    pub fn release(self, gpu: &mut B) {
        self.geometry.release(gpu);
        if let Some(texture) = self.texture {
            texture.release(gpu);
        }
    }
}
