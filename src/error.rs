use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagletError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keyboard controller error: {0}")]
    Enigo(String),

    #[error("Daemon already running with PID {0}")]
    DaemonAlreadyRunning(u32),

    #[error("Daemon is not running")]
    DaemonNotRunning,

    #[error("Error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TagletError>;
