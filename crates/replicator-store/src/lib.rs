//! Durable registry of pairs, mappings, senders, block lists, and
//! subscriptions for the replication service, backed by SQLite.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::Store;
pub use types::{BlockedImage, FilterPolicy, Mapping, Pair, PairStats, SenderRecord, StatKind, Subscription};
