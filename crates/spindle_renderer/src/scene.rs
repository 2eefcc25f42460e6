use std::rc::Rc;

use spindle_core::{FrameTransform, TransformComposer};
use thiserror::Error;

use crate::{
    backend::{GpuBackend, SurfaceState},
    drawable::{DrawMode, Drawable, DrawableError, DrawableParts},
    geometry::{GeometryError, shapes},
    shader::{BindingLayout, SOLID_COLOR, ShaderError, ShaderProgram, ShaderSource, TEXTURED},
    texture::{Image, TextureError},
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Drawable(#[from] DrawableError),

    #[error("no surface has been created yet")]
    SurfaceNotCreated,

    #[error("surface size is unknown; on_surface_changed has not run")]
    ViewportNotSet,
}

/// Android's launcher-icon green and the blue the text was painted in.
const TEXTURE_BACKGROUND: [u8; 4] = [0x3d, 0xdc, 0x84, 0xff];
const TEXTURE_INK: [u8; 4] = [0x00, 0x00, 0xdd, 0xff];

/// What to build when the surface is created.
#[derive(Clone, Debug)]
pub struct SceneSettings {
    pub clear_color: [f32; 4],
    pub solid_shader: ShaderSource,
    pub textured_shader: ShaderSource,
    pub quad_texture: Image,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 0.5],
            solid_shader: SOLID_COLOR,
            textured_shader: TEXTURED,
            quad_texture: Image::checkerboard(256, 32, TEXTURE_BACKGROUND, TEXTURE_INK),
        }
    }
}

/// Where the renderer is in the host's callback sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// No GPU resources; waiting for `on_surface_created`.
    Uninitialized,
    /// Resources built; waiting for the first `on_surface_changed`.
    Created,
    /// Frames can be drawn.
    Ready,
}

struct Scene<B: GpuBackend> {
    programs: Vec<Rc<ShaderProgram<B>>>,
    triangle: Drawable<B>,
    quad: Drawable<B>,
}

impl<B: GpuBackend> Scene<B> {
    fn build(gpu: &mut B, settings: &SceneSettings) -> Result<Self, RenderError> {
        let solid = Rc::new(ShaderProgram::new(
            gpu,
            &settings.solid_shader,
            BindingLayout::POSITION_ONLY,
        )?);

        let textured = match ShaderProgram::new(gpu, &settings.textured_shader, BindingLayout::TEXTURED)
        {
            Ok(program) => Rc::new(program),
            Err(err) => {
                release_program(gpu, solid);
                return Err(err.into());
            }
        };

        match Self::build_drawables(gpu, settings, &solid, &textured) {
            Ok((triangle, quad)) => Ok(Self {
                programs: vec![solid, textured],
                triangle,
                quad,
            }),
            Err(err) => {
                release_program(gpu, solid);
                release_program(gpu, textured);
                Err(err)
            }
        }
    }

    fn build_drawables(
        gpu: &mut B,
        settings: &SceneSettings,
        solid: &Rc<ShaderProgram<B>>,
        textured: &Rc<ShaderProgram<B>>,
    ) -> Result<(Drawable<B>, Drawable<B>), RenderError> {
        let geometry = shapes::triangle()?.upload(gpu)?;
        let triangle = Drawable::new(
            gpu,
            DrawableParts {
                label: "triangle",
                program: Rc::clone(solid),
                geometry,
                texture: None,
                mode: DrawMode::TriangleStrip,
                color: shapes::TRIANGLE_COLOR,
            },
        )?;

        let quad = Self::build_quad(gpu, settings, textured);
        match quad {
            Ok(quad) => Ok((triangle, quad)),
            Err(err) => {
                triangle.release(gpu);
                Err(err)
            }
        }
    }

    fn build_quad(
        gpu: &mut B,
        settings: &SceneSettings,
        textured: &Rc<ShaderProgram<B>>,
    ) -> Result<Drawable<B>, RenderError> {
        let geometry = shapes::quad()?.upload(gpu)?;
        let texture = match settings.quad_texture.upload(gpu) {
            Ok(texture) => texture,
            Err(err) => {
                geometry.release(gpu);
                return Err(err.into());
            }
        };

        let quad = Drawable::new(
            gpu,
            DrawableParts {
                label: "quad",
                program: Rc::clone(textured),
                geometry,
                texture: Some(texture),
                mode: DrawMode::IndexedTriangles,
                color: shapes::QUAD_TINT,
            },
        )?;
        Ok(quad)
    }

    fn draw(&self, gpu: &mut B, frame: &FrameTransform) {
        self.triangle.draw(gpu, &frame.combined);
        self.quad.draw(gpu, &frame.combined);
    }

    fn release(self, gpu: &mut B) {
        // Drawables hold program references; drop them first so each program is unique.
        self.triangle.release(gpu);
        self.quad.release(gpu);
        for program in self.programs {
            release_program(gpu, program);
        }
    }
}

fn release_program<B: GpuBackend>(gpu: &mut B, program: Rc<ShaderProgram<B>>) {
    match Rc::try_unwrap(program) {
        Ok(program) => program.release(gpu),
        Err(shared) => log::warn!(
            "shader program '{}' still in use, not deleting",
            shared.name()
        ),
    }
}

/// Implements the host's render callbacks for the triangle + quad scene.
///
/// The host must call, on its render thread: `on_surface_created` (again
/// after any context loss), `on_surface_changed` on every resize, then
/// `on_draw_frame` once per frame.
pub struct SceneRenderer<B: GpuBackend> {
    settings: SceneSettings,
    composer: TransformComposer,
    scene: Option<Scene<B>>,
    frames_drawn: u64,
}

impl<B: GpuBackend> SceneRenderer<B> {
    pub fn new(settings: SceneSettings) -> Self {
        Self {
            settings,
            composer: TransformComposer::new(),
            scene: None,
            frames_drawn: 0,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match (&self.scene, self.composer.is_ready()) {
            (None, _) => Lifecycle::Uninitialized,
            (Some(_), false) => Lifecycle::Created,
            (Some(_), true) => Lifecycle::Ready,
        }
    }

    pub fn composer(&self) -> &TransformComposer {
        &self.composer
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Builds every GPU resource from scratch.
    ///
    /// Handles from a previous surface are forgotten without being deleted,
    /// since they died with the old context. The old size is forgotten too:
    /// frames are rejected until `on_surface_changed` reports the new one.
    /// On error nothing is left allocated.
    pub fn on_surface_created(&mut self, gpu: &mut B) -> Result<(), RenderError> {
        if self.scene.take().is_some() {
            log::info!("surface recreated, rebuilding GPU resources");
        }
        self.composer.reset();

        gpu.apply_surface_state(&SurfaceState {
            clear_color: self.settings.clear_color,
            clear_depth: 1.0,
            depth_test: true,
        });

        let scene = Scene::build(gpu, &self.settings).inspect_err(|err| {
            log::error!("failed to build scene: {err}");
        })?;
        self.scene = Some(scene);
        log::info!("surface created");
        Ok(())
    }

    pub fn on_surface_changed(
        &mut self,
        gpu: &mut B,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        if self.scene.is_none() {
            return Err(RenderError::SurfaceNotCreated);
        }

        gpu.viewport(width, height);
        self.composer.on_viewport(width, height);
        Ok(())
    }

    /// Clears the surface and draws both shapes for `elapsed_ms`.
    pub fn on_draw_frame(
        &mut self,
        gpu: &mut B,
        elapsed_ms: u64,
    ) -> Result<FrameTransform, RenderError> {
        let scene = self.scene.as_ref().ok_or(RenderError::SurfaceNotCreated)?;
        let frame = self
            .composer
            .compose(elapsed_ms)
            .ok_or(RenderError::ViewportNotSet)?;

        gpu.clear();
        scene.draw(gpu, &frame);

        self.frames_drawn += 1;
        Ok(frame)
    }

    /// Forgets every GPU handle without touching the GPU.
    pub fn on_context_lost(&mut self) {
        if self.scene.take().is_some() {
            log::warn!("GPU context lost, dropping scene");
        }
        self.composer.reset();
    }

    /// Deletes every GPU resource while the context is still current.
    pub fn release(&mut self, gpu: &mut B) {
        if let Some(scene) = self.scene.take() {
            scene.release(gpu);
            log::debug!("released scene after {} frames", self.frames_drawn);
        }
    }
}
