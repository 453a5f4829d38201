//! # catalogd-watch: the watch/coalesce/dispatch engine
//!
//! Fans a catalog's long-poll endpoints out across concurrent tasks,
//! folds every change into a single in-memory [`catalogd_types::State`],
//! and dispatches an isolated snapshot to each registered listener once
//! the catalog has gone quiet for [`QUIESCENCE_WINDOW`].

mod change;
mod engine;
mod error;
mod source;

pub use change::{Change, NodeMeta};
pub use engine::{watch, QUIESCENCE_WINDOW};
pub use error::{Result, WatchError};
pub use source::CatalogSource;
