//! # catalogd-catalog: long-poll HTTP client for the catalog
//!
//! The watch engine ([`catalogd-watch`](../catalogd_watch/index.html)) drives
//! these methods in a loop, re-issuing the request with the returned index
//! each time. This crate owns only the transport: parsing a response and
//! detecting a spurious wakeup is its concern, deciding what a change means
//! for the mirrored snapshot is not.

mod client;
mod error;

pub use client::{CatalogClient, KvEntry, LongPoll, NodeListing};
pub use error::CatalogError;
