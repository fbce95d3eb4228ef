use thiserror::Error;

#[derive(Debug, Error)]
pub enum SenderPoolError {
    #[error("no eligible sender, retry after {retry_after_ms}ms")]
    NoneEligible { retry_after_ms: u64 },
    #[error("sender {0} not found in pool")]
    NotFound(i64),
}

pub type Result<T> = std::result::Result<T, SenderPoolError>;
