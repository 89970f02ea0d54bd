//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A file passed on the command line does not exist.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(String),

    /// An error occurred in the knowledge layer.
    #[error(transparent)]
    Knowledge(#[from] knowledge::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
