use thiserror::Error;

use crate::backend::{GpuBackend, TextureFilter};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextureError {
    #[error("image has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("expected {expected} RGBA bytes for {width}x{height}, got {len}")]
    PixelCount {
        width: u32,
        height: u32,
        expected: usize,
        len: usize,
    },

    #[error("GPU refused to create a texture: {0}")]
    Backend(String),
}

/// Tightly packed RGBA8 pixels, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(TextureError::PixelCount {
                width,
                height,
                expected,
                len: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// A two-colour checkerboard with `cell`-pixel squares. Zero sizes are
    /// raised to one.
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = cell.max(1);
        let mut rgba = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let texel = if (x / cell + y / cell) % 2 == 0 { a } else { b };
                rgba.extend_from_slice(&texel);
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    /// Uploads to a new 2D texture: NEAREST when shrinking, LINEAR when
    /// enlarging. Leaves unit 0 with no texture bound.
    pub fn upload<B: GpuBackend>(&self, gpu: &mut B) -> Result<GpuTexture<B>, TextureError> {
        let texture = gpu.create_texture().map_err(TextureError::Backend)?;

        gpu.bind_texture(0, Some(texture));
        gpu.texture_filters(TextureFilter::Nearest, TextureFilter::Linear);
        gpu.tex_image_rgba8(self.width, self.height, &self.rgba);
        gpu.bind_texture(0, None);

        log::debug!("uploaded {}x{} texture {:?}", self.width, self.height, texture);

        Ok(GpuTexture { texture })
    }
}

pub struct GpuTexture<B: GpuBackend> {
    texture: B::Texture,
}

impl<B: GpuBackend> std::fmt::Debug for GpuTexture<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GpuTexture").field(&self.texture).finish()
    }
}

impl<B: GpuBackend> GpuTexture<B> {
    pub fn handle(&self) -> B::Texture {
        self.texture
    }

    pub fn release(self, gpu: &mut B) {
        gpu.delete_texture(self.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCall, ObjectKind, RecordingGpu};

    #[test]
    fn rejects_wrong_pixel_count() {
        assert_eq!(
            Image::new(2, 2, vec![0; 15]),
            Err(TextureError::PixelCount { width: 2, height: 2, expected: 16, len: 15 })
        );
        assert_eq!(
            Image::new(0, 4, vec![]),
            Err(TextureError::ZeroSize { width: 0, height: 4 })
        );
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let white = [255, 255, 255, 255];
        let black = [0, 0, 0, 255];
        let image = Image::checkerboard(4, 2, white, black);

        let texel = |x: usize, y: usize| &image.pixels()[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(texel(0, 0), &white);
        assert_eq!(texel(1, 1), &white);
        assert_eq!(texel(2, 0), &black);
        assert_eq!(texel(0, 2), &black);
        assert_eq!(texel(3, 3), &white);
    }

    #[test]
    fn refused_texture_is_a_backend_error() {
        let mut gpu = RecordingGpu::new();
        gpu.fail_next_create(ObjectKind::Texture);

        let err = Image::checkerboard(2, 1, [0; 4], [255; 4])
            .upload(&mut gpu)
            .unwrap_err();
        assert!(matches!(err, TextureError::Backend(_)));
        assert!(gpu.calls().is_empty());
        assert_eq!(gpu.live_handles(), 0);
    }

    #[test]
    fn upload_sets_filters_then_pixels() {
        let mut gpu = RecordingGpu::new();
        let image = Image::checkerboard(8, 4, [1, 2, 3, 4], [5, 6, 7, 8]);
        let texture = image.upload(&mut gpu).unwrap();
        let handle = texture.handle();

        assert_eq!(
            gpu.calls(),
            &[
                GpuCall::CreateTexture { texture: handle },
                GpuCall::BindTexture { unit: 0, texture: Some(handle) },
                GpuCall::TextureFilters { min: TextureFilter::Nearest, mag: TextureFilter::Linear },
                GpuCall::TexImage { width: 8, height: 8, len: 256 },
                GpuCall::BindTexture { unit: 0, texture: None },
            ]
        );

        texture.release(&mut gpu);
        assert_eq!(gpu.live_handles(), 0);
    }
}
