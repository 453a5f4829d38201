//! # catalogd-listener: the listener contract and file-rendering listeners
//!
//! A [`Listener`] is anything that reacts to a coalesced catalog snapshot —
//! typically by rendering it into a file on disk. [`FileArtifact`] is the
//! shared primitive every such listener writes through: it makes a render
//! atomic (temp file + rename) and idempotent (a SHA-256 content compare
//! skips the rename, and the reload, when nothing changed).
//!
//! [`HostsListener`] and [`GatewayListener`] are the two concrete listeners
//! built on top of it.

mod error;
mod file;
mod gateway;
mod hosts;
mod listener;

pub use error::{ListenerError, ListenerResult};
pub use file::FileArtifact;
pub use gateway::GatewayListener;
pub use hosts::HostsListener;
pub use listener::Listener;
