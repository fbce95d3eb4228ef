//! Sender selection, health-tracking, and rate-limit recovery for the
//! outbound delivery pool.

pub mod error;
pub mod metrics;
pub mod pool;
pub mod sender;

pub use error::{Result, SenderPoolError};
pub use pool::{Selection, SenderPool};
pub use sender::Sender;
