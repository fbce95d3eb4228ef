//! `replicator-core` — shared types, error taxonomy, and configuration.
//!
//! Every other crate in the workspace depends on this one for the plain-data
//! types that cross crate boundaries (`PairId`, `SenderId`, `MediaTag`,
//! `Priority`, ...), plus config loading. It owns no I/O and no business
//! logic beyond config parsing.

pub mod config;
pub mod error;
pub mod types;

pub use error::{ErrorKind, Result};
