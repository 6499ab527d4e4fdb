use std::path::PathBuf;

use clap::Parser;

use crate::DEFAULT_SHADER_PATH;

#[derive(Parser, Debug)]
#[command(name = "cien", version, about = "Live-reloading fragment shader previewer")]
pub struct Cli {
    /// Path to fragment shader file.
    #[arg(short = 'p', long = "path", value_name = "PATH", default_value = DEFAULT_SHADER_PATH)]
    pub path: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}
