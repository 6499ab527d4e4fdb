use crate::error::InitError;
use crate::gpu::Gpu;

use std::ffi::CString;

use glow::HasContext as _;
use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext, Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasRawWindowHandle;
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoopWindowTarget;
use winit::window::{Window, WindowBuilder};

/// A window with a current OpenGL 4.1 core context.
///
/// Must stay on the thread that created it; the context is current there and
/// nowhere else. Fields drop in declaration order, GL objects first.
pub struct PreviewWindow {
    pub gl: glow::Context,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    window: Window,
}

impl PreviewWindow {
    pub fn gl_version(&self) -> String {
        // SAFETY: the context is current on this thread.
        unsafe { self.gl.get_parameter_string(glow::VERSION) }
    }

    pub fn show(&self) {
        self.window.set_visible(true);
    }

    pub fn swap_buffers(&self) -> Result<(), glutin::error::Error> {
        self.surface.swap_buffers(&self.context)
    }
}

/// Create a fixed-size, non-resizable window and make its context current.
///
/// The window starts hidden; call [`PreviewWindow::show`] once there is
/// something worth showing.
pub fn create_window(
    event_loop: &EventLoopWindowTarget<()>,
    width: u32,
    height: u32,
    title: &str,
) -> Result<PreviewWindow, InitError> {
    let window_builder = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width, height))
        .with_resizable(false)
        .with_visible(false);

    let template = ConfigTemplateBuilder::new()
        .with_depth_size(24)
        .with_stencil_size(8);

    let (window, gl_config) = DisplayBuilder::new()
        .with_window_builder(Some(window_builder))
        .build(event_loop, template, |configs| {
            // glutin-winit returns an error instead of calling the picker when
            // no config matches, so the iterator is never empty here.
            configs
                .reduce(|best, config| if config.num_samples() > best.num_samples() { config } else { best })
                .expect("glutin offers at least one config")
        })
        .map_err(|e| InitError::Window(e.to_string()))?;
    let window = window.ok_or(InitError::NoWindow)?;

    let gl_display = gl_config.display();
    let context_attributes = ContextAttributesBuilder::new()
        .with_profile(GlProfile::Core)
        .with_context_api(ContextApi::OpenGl(Some(Version::new(4, 1))))
        .build(Some(window.raw_window_handle()));

    // SAFETY: the raw window handle belongs to `window`, which outlives the
    // context and surface inside `PreviewWindow`.
    let not_current = unsafe { gl_display.create_context(&gl_config, &context_attributes)? };
    let surface_attributes = window.build_surface_attributes(Default::default());
    let surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attributes)? };
    let context = not_current.make_current(&surface)?;

    // SAFETY: the context was just made current on this thread.
    let gl = unsafe {
        glow::Context::from_loader_function(|symbol| match CString::new(symbol) {
            Ok(symbol) => gl_display.get_proc_address(&symbol),
            Err(_) => std::ptr::null(),
        })
    };
    gl.enable_depth_test();

    Ok(PreviewWindow {
        gl,
        surface,
        context,
        window,
    })
}
