//! Error types for envsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use envsync_core::{ConfigError, ValidationError};
use envsync_renderer::RenderError;

/// All errors that can arise from repository and environment operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An external command exited non-zero. Carries stdout + stderr.
    #[error("`{command}` failed with: {output}")]
    Command { command: String, output: String },

    /// An external command could not be started at all.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Clone, fetch or prune of the mirror failed.
    #[error("mirror sync failed at {path}: {source}")]
    MirrorSync {
        path: PathBuf,
        #[source]
        source: Box<SyncError>,
    },

    /// A repository-wide operation needs a mirror that has not been cloned yet.
    #[error("mirror not found at {path}; run an update first")]
    MirrorMissing { path: PathBuf },

    /// Any failure while materialising a branch into its environment.
    #[error("checkout of '{branch}' failed: {source}")]
    Checkout {
        branch: String,
        #[source]
        source: Box<SyncError>,
    },

    /// The repository lock could not be taken.
    #[error("cannot lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from the environment config renderer.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A request argument was rejected before any side effect.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// An error loading configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
