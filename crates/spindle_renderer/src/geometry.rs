use thiserror::Error;

use crate::backend::{BufferTarget, GpuBackend};

pub const POSITION_COMPONENTS: usize = 3;
pub const TEX_COORD_COMPONENTS: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("vertex set is empty")]
    Empty,

    #[error("{len} position floats is not a whole number of 3-component vertices")]
    MisalignedPositions { len: usize },

    #[error("expected {expected} texture coordinate floats for {vertices} vertices, got {len}")]
    TexCoordCount {
        vertices: usize,
        expected: usize,
        len: usize,
    },

    #[error("draw order length {len} is not a whole number of triangles")]
    PartialTriangle { len: usize },

    #[error("draw order entry {index} is out of range for {vertices} vertices")]
    IndexOutOfRange { index: u16, vertices: usize },

    #[error("{count} elements exceed the GL draw count limit")]
    TooLarge { count: usize },

    #[error("GPU refused to create a buffer: {0}")]
    Backend(String),
}

/// Converts an element count to the `GLsizei` the draw calls take.
fn gl_count(count: usize) -> Result<i32, GeometryError> {
    i32::try_from(count).map_err(|_| GeometryError::TooLarge { count })
}

/// CPU-side vertex data, validated and ready for a single upload.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    positions: Vec<f32>,
    tex_coords: Option<Vec<f32>>,
    indices: Option<Vec<u16>>,
    vertex_count: i32,
    index_count: i32,
}

impl Geometry {
    pub fn new(
        positions: Vec<f32>,
        tex_coords: Option<Vec<f32>>,
        indices: Option<Vec<u16>>,
    ) -> Result<Self, GeometryError> {
        if positions.is_empty() {
            return Err(GeometryError::Empty);
        }
        if positions.len() % POSITION_COMPONENTS != 0 {
            return Err(GeometryError::MisalignedPositions {
                len: positions.len(),
            });
        }
        let vertices = positions.len() / POSITION_COMPONENTS;
        let vertex_count = gl_count(vertices)?;

        if let Some(tex_coords) = &tex_coords {
            let expected = vertices * TEX_COORD_COMPONENTS;
            if tex_coords.len() != expected {
                return Err(GeometryError::TexCoordCount {
                    vertices,
                    expected,
                    len: tex_coords.len(),
                });
            }
        }

        if let Some(indices) = &indices {
            if indices.is_empty() || indices.len() % 3 != 0 {
                return Err(GeometryError::PartialTriangle { len: indices.len() });
            }
            if let Some(&index) = indices.iter().find(|&&i| usize::from(i) >= vertices) {
                return Err(GeometryError::IndexOutOfRange { index, vertices });
            }
        }

        let index_count = gl_count(indices.as_ref().map_or(0, Vec::len))?;

        Ok(Self {
            positions,
            tex_coords,
            indices,
            vertex_count,
            index_count,
        })
    }

    pub fn vertex_count(&self) -> i32 {
        self.vertex_count
    }

    /// Copies the data into GPU buffers once, consuming the CPU copy.
    ///
    /// Buffers created before a failure are deleted before returning.
    pub fn upload<B: GpuBackend>(self, gpu: &mut B) -> Result<GpuGeometry<B>, GeometryError> {
        let vertex_count = self.vertex_count;
        let index_count = self.index_count;
        let mut created = Vec::with_capacity(3);
        let result = self.upload_buffers(gpu, &mut created);

        gpu.bind_buffer(BufferTarget::Array, None);
        gpu.bind_buffer(BufferTarget::ElementArray, None);

        match result {
            Ok((positions, tex_coords, indices)) => {
                log::debug!("uploaded {vertex_count} vertices ({index_count} indices)");
                Ok(GpuGeometry {
                    positions,
                    tex_coords,
                    indices,
                    vertex_count,
                    index_count,
                })
            }
            Err(err) => {
                for buffer in created {
                    gpu.delete_buffer(buffer);
                }
                Err(err)
            }
        }
    }

    fn upload_buffers<B: GpuBackend>(
        &self,
        gpu: &mut B,
        created: &mut Vec<B::Buffer>,
    ) -> Result<UploadedBuffers<B>, GeometryError> {
        let positions = upload_buffer(gpu, BufferTarget::Array, bytemuck::cast_slice(&self.positions))?;
        created.push(positions);

        let tex_coords = match &self.tex_coords {
            Some(data) => {
                let buffer = upload_buffer(gpu, BufferTarget::Array, bytemuck::cast_slice(data))?;
                created.push(buffer);
                Some(buffer)
            }
            None => None,
        };

        let indices = match &self.indices {
            Some(data) => {
                let buffer =
                    upload_buffer(gpu, BufferTarget::ElementArray, bytemuck::cast_slice(data))?;
                created.push(buffer);
                Some(buffer)
            }
            None => None,
        };

        Ok((positions, tex_coords, indices))
    }
}

type UploadedBuffers<B> = (
    <B as GpuBackend>::Buffer,
    Option<<B as GpuBackend>::Buffer>,
    Option<<B as GpuBackend>::Buffer>,
);

fn upload_buffer<B: GpuBackend>(
    gpu: &mut B,
    target: BufferTarget,
    bytes: &[u8],
) -> Result<B::Buffer, GeometryError> {
    let buffer = gpu.create_buffer().map_err(GeometryError::Backend)?;
    gpu.bind_buffer(target, Some(buffer));
    gpu.buffer_data(target, bytes);
    Ok(buffer)
}

/// GPU-resident, immutable geometry.
pub struct GpuGeometry<B: GpuBackend> {
    positions: B::Buffer,
    tex_coords: Option<B::Buffer>,
    indices: Option<B::Buffer>,
    vertex_count: i32,
    index_count: i32,
}

impl<B: GpuBackend> std::fmt::Debug for GpuGeometry<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuGeometry")
            .field("positions", &self.positions)
            .field("tex_coords", &self.tex_coords)
            .field("indices", &self.indices)
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .finish()
    }
}

impl<B: GpuBackend> GpuGeometry<B> {
    pub fn vertex_count(&self) -> i32 {
        self.vertex_count
    }

    /// Zero when the geometry has no draw order.
    pub fn index_count(&self) -> i32 {
        self.index_count
    }

    pub fn position_buffer(&self) -> B::Buffer {
        self.positions
    }

    pub fn tex_coord_buffer(&self) -> Option<B::Buffer> {
        self.tex_coords
    }

    pub fn index_buffer(&self) -> Option<B::Buffer> {
        self.indices
    }

    pub fn release(self, gpu: &mut B) {
        gpu.delete_buffer(self.positions);
        if let Some(buffer) = self.tex_coords {
            gpu.delete_buffer(buffer);
        }
        if let Some(buffer) = self.indices {
            gpu.delete_buffer(buffer);
        }
    }
}

/// The demo's two shapes.
pub mod shapes {
    use super::{Geometry, GeometryError};

    #[rustfmt::skip]
    pub const TRIANGLE_POSITIONS: [f32; 9] = [
         0.0,  0.622_008_46, 0.0, // top
        -0.5, -0.311_004_23, 0.0, // bottom left
         0.5, -0.311_004_23, 0.0, // bottom right
    ];

    pub const TRIANGLE_COLOR: [f32; 4] = [0.636_718_75, 0.769_531_25, 0.222_656_25, 1.0];

    #[rustfmt::skip]
    pub const QUAD_POSITIONS: [f32; 12] = [
        -1.0, -0.5, 0.0, // V1 - bottom left
        -1.0,  0.5, 0.0, // V2 - top left
         0.0, -0.5, 0.0, // V3 - bottom right
         0.0,  0.5, 0.0, // V4 - top right
    ];

    #[rustfmt::skip]
    pub const QUAD_TEX_COORDS: [f32; 8] = [
        0.0, 1.0,
        0.0, 0.0,
        1.0, 1.0,
        1.0, 0.0,
    ];

    /// Two triangles sharing the top-left / bottom-right diagonal.
    pub const QUAD_DRAW_ORDER: [u16; 6] = [0, 1, 2, 2, 1, 3];

    pub const QUAD_TINT: [f32; 4] = [0.0, 1.0, 0.0, 0.5];

    pub fn triangle() -> Result<Geometry, GeometryError> {
        Geometry::new(TRIANGLE_POSITIONS.to_vec(), None, None)
    }

    pub fn quad() -> Result<Geometry, GeometryError> {
        Geometry::new(
            QUAD_POSITIONS.to_vec(),
            Some(QUAD_TEX_COORDS.to_vec()),
            Some(QUAD_DRAW_ORDER.to_vec()),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::shapes::*;
    use super::*;
    use crate::backend::{GpuCall, ObjectKind, RecordingGpu};

    #[test]
    fn uploaded_vertex_counts_match_shapes() {
        let mut gpu = RecordingGpu::new();

        let triangle = triangle().unwrap().upload(&mut gpu).unwrap();
        let quad = quad().unwrap().upload(&mut gpu).unwrap();

        assert_eq!(triangle.vertex_count(), 3);
        assert_eq!(triangle.index_count(), 0);
        assert!(triangle.tex_coord_buffer().is_none());

        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.index_count(), 6);
        assert!(quad.tex_coord_buffer().is_some());
        assert_eq!(gpu.live_buffers(), 4);
    }

    #[test]
    fn upload_uses_native_byte_order() {
        let mut gpu = RecordingGpu::new();
        let quad = quad().unwrap().upload(&mut gpu).unwrap();

        let bytes = gpu.buffer_contents(quad.position_buffer()).unwrap();
        let expected: Vec<u8> = QUAD_POSITIONS
            .iter()
            .flat_map(|value| value.to_ne_bytes())
            .collect();
        assert_eq!(bytes, expected.as_slice());

        let index_bytes = gpu.buffer_contents(quad.index_buffer().unwrap()).unwrap();
        assert_eq!(index_bytes.len(), 6 * std::mem::size_of::<u16>());
        assert_eq!(&index_bytes[6..8], &2u16.to_ne_bytes());
    }

    #[test]
    fn upload_leaves_no_buffer_bound() {
        let mut gpu = RecordingGpu::new();
        quad().unwrap().upload(&mut gpu).unwrap();

        let calls = gpu.calls();
        let tail = &calls[calls.len() - 2..];
        assert_eq!(
            tail,
            &[
                GpuCall::BindBuffer { target: BufferTarget::Array, buffer: None },
                GpuCall::BindBuffer { target: BufferTarget::ElementArray, buffer: None },
            ]
        );
    }

    #[test]
    fn quad_draw_order_is_two_triangles_on_one_diagonal() {
        assert_eq!(QUAD_DRAW_ORDER.len(), 6);

        let distinct: BTreeSet<u16> = QUAD_DRAW_ORDER.iter().copied().collect();
        assert_eq!(distinct, BTreeSet::from([0, 1, 2, 3]));

        let first: BTreeSet<u16> = QUAD_DRAW_ORDER[..3].iter().copied().collect();
        let second: BTreeSet<u16> = QUAD_DRAW_ORDER[3..].iter().copied().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);

        let shared: Vec<u16> = first.intersection(&second).copied().collect();
        assert_eq!(shared, vec![1, 2]);

        // The shared edge joins opposite corners: top-left and bottom-right.
        let positions = QUAD_POSITIONS;
        let corner = |i: u16| &positions[usize::from(i) * 3..usize::from(i) * 3 + 2];
        let (a, b) = (corner(shared[0]), corner(shared[1]));
        assert!(a[0] != b[0] && a[1] != b[1]);
    }

    #[test]
    fn rejects_bad_layouts() {
        assert_eq!(Geometry::new(vec![], None, None), Err(GeometryError::Empty));
        assert_eq!(
            Geometry::new(vec![0.0; 4], None, None),
            Err(GeometryError::MisalignedPositions { len: 4 })
        );
        assert_eq!(
            Geometry::new(vec![0.0; 9], Some(vec![0.0; 4]), None),
            Err(GeometryError::TexCoordCount { vertices: 3, expected: 6, len: 4 })
        );
        assert_eq!(
            Geometry::new(vec![0.0; 9], None, Some(vec![0, 1])),
            Err(GeometryError::PartialTriangle { len: 2 })
        );
        assert_eq!(
            Geometry::new(vec![0.0; 9], None, Some(vec![0, 1, 3])),
            Err(GeometryError::IndexOutOfRange { index: 3, vertices: 3 })
        );
    }

    #[test]
    fn draw_counts_must_fit_gl_sizei() {
        assert_eq!(gl_count(6), Ok(6));
        assert_eq!(gl_count(i32::MAX as usize), Ok(i32::MAX));
        assert_eq!(
            gl_count(i32::MAX as usize + 1),
            Err(GeometryError::TooLarge { count: i32::MAX as usize + 1 })
        );
    }

    #[test]
    fn failed_buffer_creation_deletes_earlier_buffers() {
        // Fail the tex-coord buffer, then the index buffer.
        for skip in [1, 2] {
            let mut gpu = RecordingGpu::new();
            gpu.fail_create_after(ObjectKind::Buffer, skip);

            let err = quad().unwrap().upload(&mut gpu).unwrap_err();
            assert!(matches!(err, GeometryError::Backend(_)), "skip={skip}: {err:?}");
            assert_eq!(gpu.live_handles(), 0, "skip={skip}");

            let deleted = gpu
                .calls()
                .iter()
                .filter(|call| matches!(call, GpuCall::DeleteBuffer { .. }))
                .count();
            assert_eq!(deleted, skip, "skip={skip}");
        }
    }

    #[test]
    fn failed_first_buffer_leaves_nothing() {
        let mut gpu = RecordingGpu::new();
        gpu.fail_next_create(ObjectKind::Buffer);

        let err = triangle().unwrap().upload(&mut gpu).unwrap_err();
        assert!(matches!(err, GeometryError::Backend(_)));
        assert_eq!(gpu.live_handles(), 0);
    }

    #[test]
    fn release_frees_every_buffer() {
        let mut gpu = RecordingGpu::new();
        let quad = quad().unwrap().upload(&mut gpu).unwrap();
        quad.release(&mut gpu);
        assert_eq!(gpu.live_handles(), 0);
    }
}
