use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the agent runtime and its client protocol.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] envsync_sync::SyncError),

    #[error("config error: {0}")]
    Config(#[from] envsync_core::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("agent protocol error: {0}")]
    Protocol(String),

    #[error("agent is not running (socket missing: {socket})")]
    AgentNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> AgentError {
    AgentError::Io {
        path: path.into(),
        source,
    }
}
