use spindle_core::{AppConfig, FrameClock};
use spindle_renderer::{GlowBackend, RenderError, SceneRenderer, SceneSettings};
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

mod context;

use context::GlSurfaceState;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("no usable GL display: {0}")]
    Display(String),

    #[error("display was created without a window")]
    NoWindow,

    #[error("window handle unavailable: {0}")]
    Handle(#[from] raw_window_handle::HandleError),

    #[error("GL error: {0}")]
    Gl(#[from] glutin::error::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

// Holds the renderer while the OS decides when a surface exists.
struct SpindleRunner {
    config: AppConfig,
    renderer: SceneRenderer<GlowBackend>,
    clock: FrameClock,
    gl: Option<GlSurfaceState>,
    error: Option<WindowError>,
}

impl SpindleRunner {
    fn new(config: AppConfig, settings: SceneSettings) -> Self {
        Self {
            config,
            renderer: SceneRenderer::new(settings),
            clock: FrameClock::new(),
            gl: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: WindowError) {
        log::error!("{err}");
        self.error.get_or_insert(err);
        event_loop.exit();
    }

    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<(), WindowError> {
        let mut gl = GlSurfaceState::create(event_loop, &self.config)?;
        self.renderer.on_surface_created(&mut gl.gpu)?;

        let size = gl.window.inner_size();
        if gl.resize(size.width, size.height) {
            self.renderer
                .on_surface_changed(&mut gl.gpu, size.width, size.height)?;
        }

        self.clock.reset();
        gl.window.request_redraw();
        self.gl = Some(gl);
        Ok(())
    }

    fn draw_frame(&mut self) -> Result<(), WindowError> {
        let Some(gl) = self.gl.as_mut() else {
            return Ok(());
        };

        self.clock.update();
        match self
            .renderer
            .on_draw_frame(&mut gl.gpu, self.clock.elapsed_millis())
        {
            Ok(frame) => {
                if self.clock.frame_index() % 240 == 0 {
                    log::debug!(
                        "frame {} at {:.1} deg, {:.2} ms",
                        self.clock.frame_index(),
                        frame.angle_degrees,
                        self.clock.delta_seconds() * 1000.0
                    );
                }
            }
            // Minimised before the first size event; nothing to draw yet.
            Err(RenderError::ViewportNotSet) => {}
            Err(err) => return Err(err.into()),
        }

        gl.swap_buffers()?;
        gl.window.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for SpindleRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gl.is_some() {
            return;
        }
        if let Err(err) = self.create_surface(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        // The surface goes away with the activity; rebuild on the next resume.
        if let Some(mut gl) = self.gl.take() {
            self.renderer.release(&mut gl.gpu);
        }
        self.renderer.on_context_lost();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::Resized(size) => {
                let result = match self.gl.as_mut() {
                    Some(gl) if gl.resize(size.width, size.height) => {
                        self.renderer
                            .on_surface_changed(&mut gl.gpu, size.width, size.height)
                    }
                    _ => Ok(()),
                };
                if let Err(err) = result {
                    self.fail(event_loop, err.into());
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            }
            | WindowEvent::CloseRequested => {
                log::info!(
                    "closing after {} frames",
                    self.renderer.frames_drawn()
                );
                if let Some(mut gl) = self.gl.take() {
                    self.renderer.release(&mut gl.gpu);
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.draw_frame() {
                    self.fail(event_loop, err);
                }
            }
            _ => (),
        }
    }
}

/// Opens the window and drives the renderer until the window is closed.
pub fn run(config: AppConfig, settings: SceneSettings) -> Result<(), WindowError> {
    let event_loop = EventLoop::new()?;

    // Each frame requests the next one, so waiting costs nothing.
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut runner = SpindleRunner::new(config, settings);
    event_loop.run_app(&mut runner)?;

    match runner.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
