use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::gpu::ShaderStage;

/// Failures while bringing up the window and its OpenGL context.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(String),
    #[error("display did not produce a window")]
    NoWindow,
    #[error("failed to set up OpenGL context: {0}")]
    Context(#[from] glutin::error::Error),
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read fragment shader {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to stat fragment shader {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to compile {stage} shader:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("failed to link program:\n{log}")]
    Link { log: String },
    #[error("failed to create {what}: {reason}")]
    Allocation { what: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("event loop terminated: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
