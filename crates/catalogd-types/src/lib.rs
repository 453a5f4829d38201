//! # catalogd-types: core data model for `catalogd`
//!
//! This crate contains the in-memory representation of a mirrored catalog:
//! - Registered machines and their endpoints ([`Node`], [`Service`])
//! - The hierarchical key-value tree ([`KvNode`])
//! - The full mirrored snapshot and its derived group index ([`State`])
//!
//! Every type here is plain data: no I/O, no async, nothing that depends on a
//! particular catalog backend. [`State`] is [`Clone`] and [`PartialEq`] by
//! value, which is what lets the watch engine hand each listener an
//! independent, isolated snapshot and decide whether a change is worth
//! dispatching at all.

mod kv;
mod node;
mod state;

pub use kv::KvNode;
pub use node::{Node, Service};
pub use state::{group_members, in_group, State};
