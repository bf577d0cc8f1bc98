use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlexError>;

/// Startup-time failures. Per-request failures use [`crate::operations::OpError`].
#[derive(Error, Debug)]
pub enum FlexError {
    #[error("Config error on line {line}: {message}")]
    Config { line: usize, message: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid arguments: {0}")]
    Args(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FUSE error: {0}")]
    Fuse(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl FlexError {
    pub(crate) fn config(line: usize, message: impl Into<String>) -> Self {
        FlexError::Config {
            line,
            message: message.into(),
        }
    }
}
