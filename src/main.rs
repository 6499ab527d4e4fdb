mod app;
mod cli;
mod data;
mod error;
mod gpu;
mod render_engine;

pub const DEFAULT_SHADER_PATH: &str = "shader.frag";
pub const TITLE_PREFIX: &str = "cien - ";
pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 600;
/// Shared by the render tick and the file-check tick.
pub const TICK_INTERVAL: f64 = 1.0 / 60.0;
pub const BACKGROUND_COLOR: [f32; 4] = [0.49, 0.83, 0.91, 1.0];

pub const GLOBAL_TIME_UNIFORM: &str = "fGlobalTime";
pub const RESOLUTION_UNIFORM: &str = "v2Resolution";
pub const POSITION_ATTRIBUTE: &str = "in_pos";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::parse();
    if let Err(err) = app::run(cli) {
        log::error!("{err}");
        std::process::exit(1);
    }
}
