use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("pair {0} not found")]
    PairNotFound(i64),

    #[error("sender {0} not found")]
    SenderNotFound(i64),

    #[error("mapping for source message {0} on pair {1} not found")]
    MappingNotFound(i64, i64),

    #[error("subscription for user {0} not found")]
    SubscriptionNotFound(String),

    #[error("a pair already replicates {0} into {1}")]
    DuplicatePair(i64, i64),
}

pub type Result<T> = std::result::Result<T, StoreError>;
