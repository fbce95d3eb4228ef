use thiserror::Error;

/// Cross-cutting error taxonomy shared by every subsystem crate.
///
/// Individual crates (`replicator-store`, `replicator-dispatch`, ...) define
/// their own `thiserror` enums for crate-local detail and convert into this
/// taxonomy only at the boundary where an admin-facing caller needs a single
/// textual classification — it is not a blanket "one error to rule them all"
/// type.
#[derive(Debug, Error, Clone)]
pub enum ErrorKind {
    #[error("transient error: {0}")]
    Transient(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("permanent error: {0}")]
    Permanent(String),

    #[error("filtered: {0}")]
    FilterDrop(String),

    #[error("queue overflow")]
    QueueOverflow,

    #[error("store error: {0}")]
    Store(String),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ErrorKind>;
