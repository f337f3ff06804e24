//! Upstream snapshot sources
//!
//! The poller only knows the [`SnapshotFetcher`] trait. [`HttpCsvFetcher`]
//! is the production implementation that pulls a CSV document over HTTP.

pub mod config;
pub mod http;

use std::future::Future;

pub use config::SourceConfig;
pub use http::HttpCsvFetcher;

use crate::snapshot::Snapshot;

/// Transient failure retrieving a snapshot
///
/// Every variant discards the current poll cycle; the next scheduled tick
/// simply tries again.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Request could not be sent or the body could not be read
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {0}")]
    Status(u16),

    /// Payload is larger than the configured limit
    #[error("payload exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// Payload is not valid CSV
    #[error("malformed payload: {0}")]
    Malformed(csv::Error),

    /// Payload has no header row
    #[error("payload has no header row")]
    MissingHeader,

    /// Source-specific failure
    #[error("{0}")]
    Other(String),
}

/// Something that can produce the current snapshot
///
/// Implementations are called at most once at a time by the scheduler, but
/// must be shareable across tasks.
pub trait SnapshotFetcher: Send + Sync + 'static {
    /// Retrieve the current dataset
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, FetchError>> + Send;
}
