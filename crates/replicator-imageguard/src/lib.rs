//! Perceptual-hash image blocking and watermark rendering.

pub mod error;
pub mod guard;
pub mod phash;
pub mod watermark;

pub use error::{ImageGuardError, Result};
pub use guard::{check, encode_jpeg, hamming, phash_of, watermark_if_configured, BlockDecision};
