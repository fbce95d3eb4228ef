use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] replicator_store::StoreError),

    #[error(transparent)]
    Dispatch(#[from] replicator_dispatch::DispatchError),

    #[error(transparent)]
    ImageGuard(#[from] replicator_imageguard::ImageGuardError),

    #[error(transparent)]
    Health(#[from] replicator_health::HealthError),

    #[error("{0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Textual classification for the admin-facing surface, per the shared
    /// error taxonomy every crate boundary converts into.
    pub fn into_core(self) -> replicator_core::ErrorKind {
        replicator_core::ErrorKind::Permanent(self.to_string())
    }
}
