use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error(transparent)]
    Store(#[from] replicator_store::StoreError),
}

pub type Result<T> = std::result::Result<T, HealthError>;
