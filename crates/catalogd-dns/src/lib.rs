//! # catalogd-dns: registrar client and A-record reconciler
//!
//! A sketch-level listener: computes the desired set of public hostnames
//! from [`catalogd_types::State`] and reconciles it against a Porkbun-style
//! DNS registrar's `A` records.

mod error;
mod listener;
mod registrar;

pub use error::RegistrarError;
pub use listener::DnsListener;
pub use registrar::{RegistrarClient, Record};
