//! # nfoscene common library
//!
//! Shared code for the nfoscene workspace:
//! - Error type used by configuration loading
//! - TOML configuration file resolution and loading
//! - The immutable reconciliation policy handed to every pipeline component

pub mod config;
pub mod error;
pub mod policy;

pub use error::{Error, Result};
pub use policy::{EntityKind, MetadataField, ReconciliationPolicy};
