//! Error types for the watch engine.

use catalogd_catalog::CatalogError;
use catalogd_listener::ListenerError;
use thiserror::Error;

/// Errors from the watch/coalesce/dispatch engine.
///
/// Any of these is fatal to the whole watch group: per the engine's
/// cancellation-scope policy, one failing watch or listener cancels every
/// other task in the group rather than letting them silently drift out of
/// sync with each other.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("catalog request failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("listener {listener} failed: {source}")]
    Listener {
        listener: String,
        source: ListenerError,
    },

    #[error("watch group cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, WatchError>;
