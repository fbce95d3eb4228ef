//! Rolling health metrics, sustained-breach alerting, and the hourly
//! subscription-expiry sweeper.

pub mod error;
pub mod metrics;
pub mod monitor;
pub mod sweeper;

pub use error::{HealthError, Result};
pub use metrics::{ErrorRateWatch, Severity};
pub use monitor::{Alert, HealthMonitor, HealthSnapshot};
pub use sweeper::SubscriptionSweeper;
