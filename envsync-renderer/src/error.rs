//! Error types for envsync-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while rendering the environment config.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Filesystem error while reading the base config.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
