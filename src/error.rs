//! Crate-level error types
//!
//! Component errors (`FetchError`, `DeliveryError`) are recovered where
//! they happen. [`Error`] is what escapes to callers: startup problems and
//! failed poll cycles reported to the scheduler.

use crate::source::FetchError;

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Retrieving or parsing the upstream snapshot failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Snapshot could not be encoded into a transport payload
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Configuration sources could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket or runtime I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
