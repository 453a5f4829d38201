//! Listener error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for listener operations.
pub type ListenerResult<T> = Result<T, ListenerError>;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("i/o error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to resolve owner {user}:{group} for {path}: {source}")]
    Owner {
        path: PathBuf,
        user: String,
        group: String,
        source: std::io::Error,
    },

    #[error("post-write command failed with status {status:?}: {command}")]
    ExecFailed {
        command: String,
        status: Option<i32>,
    },

    #[error("failed to render {what}: {reason}")]
    Render { what: String, reason: String },
}
