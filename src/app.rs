mod clock;
mod context;
mod export;

use crate::cli::Cli;
use crate::data::FrameInputs;
use crate::error::{AppError, InitError};
use crate::gpu::Gpu;
use crate::render_engine::{Reload, ShaderUnit};
use crate::{BACKGROUND_COLOR, TICK_INTERVAL, TITLE_PREFIX, WINDOW_HEIGHT, WINDOW_WIDTH};

use clock::{Clock, Ticker};
use context::PreviewWindow;

use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};

pub struct ShaderApp {
    window: PreviewWindow,
    shader: ShaderUnit<glow::Context>,
    clock: Clock,
    render_tick: Ticker,
    file_tick: Ticker,
    close_requested: bool,
    screenshot_requested: bool,
}

/// Open the window, build the shader unit and render until the window closes.
///
/// Anything failing before the loop starts is returned; once running, errors
/// are logged and the previous program keeps rendering.
pub fn run(cli: Cli) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(InitError::from)?;

    let title = format!("{TITLE_PREFIX}{}", cli.path.display());
    let window = context::create_window(&event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, &title)?;
    log::info!("OpenGL version {}", window.gl_version());

    let shader = ShaderUnit::new(&window.gl, cli.path)?;
    window.show();

    let mut app = ShaderApp::new(window, shader);
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run(move |event, target| app.handle_event(event, target))?;
    Ok(())
}

impl ShaderApp {
    fn new(window: PreviewWindow, shader: ShaderUnit<glow::Context>) -> Self {
        let clock = Clock::start();
        let now = clock.seconds();
        Self {
            window,
            shader,
            clock,
            render_tick: Ticker::new(TICK_INTERVAL, now),
            file_tick: Ticker::new(TICK_INTERVAL, now),
            close_requested: false,
            screenshot_requested: false,
        }
    }

    fn handle_event(&mut self, event: Event<()>, target: &EventLoopWindowTarget<()>) {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => self.close_requested = true,
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            logical_key: Key::Named(NamedKey::F12),
                            state: ElementState::Pressed,
                            repeat: false,
                            ..
                        },
                    ..
                } => self.screenshot_requested = true,
                _ => {}
            },
            Event::AboutToWait if !self.close_requested => self.tick(),
            _ => {}
        }

        if self.close_requested {
            target.exit();
        }
    }

    fn tick(&mut self) {
        let now = self.clock.seconds();

        if self.render_tick.due(now) {
            render_frame(&self.window.gl, &self.shader, now);

            if std::mem::take(&mut self.screenshot_requested) {
                export::save_screenshot(&self.window.gl, WINDOW_WIDTH, WINDOW_HEIGHT);
            }
            if let Err(e) = self.window.swap_buffers() {
                log::error!("Failed to swap buffers: {}", e);
            }
        }

        if self.file_tick.due(now) {
            check_file(&self.window.gl, &mut self.shader);
        }
    }
}

fn render_frame<G: Gpu>(gl: &G, shader: &ShaderUnit<G>, now: f64) {
    shader.apply(
        gl,
        &FrameInputs {
            global_time: now as f32,
            resolution: [WINDOW_WIDTH as f32, WINDOW_HEIGHT as f32],
        },
    );
    gl.clear_frame(BACKGROUND_COLOR);
    shader.draw(gl);
}

fn check_file<G: Gpu>(gl: &G, shader: &mut ShaderUnit<G>) {
    match shader.reload_if_modified(gl) {
        Ok(Reload::Reloaded) => log::info!(
            "Reloaded fragment shader {:?} ({} bytes, program {:?})",
            shader.fragment_path(),
            shader.fragment_source().len(),
            shader.program()
        ),
        Ok(Reload::Unchanged) => {}
        Err(e) => log::error!("{}", e),
    }
}
