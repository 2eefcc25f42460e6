use std::num::NonZeroU32;

use glutin::{
    config::{Config, ConfigTemplateBuilder, GlConfig},
    context::{
        ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext, Version,
    },
    display::{GetGlDisplay, GlDisplay},
    surface::{GlSurface, Surface, SwapInterval, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasWindowHandle;
use spindle_core::AppConfig;
use spindle_renderer::GlowBackend;
use winit::{event_loop::ActiveEventLoop, window::Window};

use crate::WindowError;

/// Everything that lives exactly as long as one GL surface.
///
/// Field order is drop order: the backend goes before the context it uses.
pub(crate) struct GlSurfaceState {
    pub gpu: GlowBackend,
    pub surface: Surface<WindowSurface>,
    pub context: PossiblyCurrentContext,
    pub window: Window,
}

impl GlSurfaceState {
    /// Opens a window with a current GLES 2.0 context.
    pub fn create(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self, WindowError> {
        let attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(16);

        let (window, gl_config) = DisplayBuilder::new()
            .with_window_attributes(Some(attributes))
            .build(event_loop, template, pick_config)
            .map_err(|err| WindowError::Display(err.to_string()))?;
        let window = window.ok_or(WindowError::NoWindow)?;

        let raw_window = window.window_handle()?.as_raw();
        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::Gles(Some(Version::new(2, 0))))
            .build(Some(raw_window));

        let display = gl_config.display();
        let surface_attributes = window.build_surface_attributes(Default::default())?;

        // SAFETY: the window outlives the surface and context; all three are
        // dropped together with `GlSurfaceState`.
        let (surface, context) = unsafe {
            let context = display.create_context(&gl_config, &context_attributes)?;
            let surface = display.create_window_surface(&gl_config, &surface_attributes)?;
            let context = context.make_current(&surface)?;
            (surface, context)
        };

        let interval = if config.vsync {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        if let Err(err) = surface.set_swap_interval(&context, interval) {
            log::warn!("could not set swap interval: {err}");
        }

        // SAFETY: the context was made current above.
        let gl = unsafe {
            glow::Context::from_loader_function_cstr(|symbol| display.get_proc_address(symbol))
        };
        log::info!(
            "GL context ready: {} samples, depth {}",
            gl_config.num_samples(),
            gl_config.depth_size()
        );

        Ok(Self {
            gpu: GlowBackend::new(gl),
            surface,
            context,
            window,
        })
    }

    /// Returns false when either side is zero, i.e. the window is minimised.
    pub fn resize(&self, width: u32, height: u32) -> bool {
        match (NonZeroU32::new(width), NonZeroU32::new(height)) {
            (Some(width), Some(height)) => {
                self.surface.resize(&self.context, width, height);
                true
            }
            _ => false,
        }
    }

    pub fn swap_buffers(&self) -> Result<(), WindowError> {
        self.surface.swap_buffers(&self.context)?;
        Ok(())
    }
}

/// Prefers multisampled configs. glutin only calls this with a non-empty set.
fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    configs
        .reduce(|best, candidate| {
            if candidate.num_samples() > best.num_samples() {
                candidate
            } else {
                best
            }
        })
        .expect("glutin offers at least one config")
}
