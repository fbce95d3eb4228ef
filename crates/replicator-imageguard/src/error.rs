use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageGuardError {
    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImageGuardError>;
