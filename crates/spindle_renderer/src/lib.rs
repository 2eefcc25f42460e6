pub mod backend;
pub mod drawable;
pub mod geometry;
pub mod scene;
pub mod shader;
pub mod texture;

pub use backend::{GlowBackend, GpuBackend, GpuCall, ObjectKind, RecordingGpu, SurfaceState};
pub use drawable::{DrawMode, Drawable, DrawableError, DrawableParts};
pub use geometry::{Geometry, GeometryError, GpuGeometry};
pub use scene::{Lifecycle, RenderError, SceneRenderer, SceneSettings};
pub use shader::{BindingLayout, ShaderError, ShaderProgram, ShaderSource};
pub use texture::{GpuTexture, Image, TextureError};
