use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("queue is at capacity ({0} tasks)")]
    QueueOverflow(usize),
    #[error("circuit breaker open for priority below HIGH")]
    Backpressure,
    #[error("dispatcher is shutting down, no longer accepting tasks")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, DispatchError>;
