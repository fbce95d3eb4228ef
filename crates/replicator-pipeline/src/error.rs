use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] replicator_store::StoreError),
    #[error(transparent)]
    Dispatch(#[from] replicator_dispatch::DispatchError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
