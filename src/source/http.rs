//! HTTP CSV fetcher

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::snapshot::{parse_csv, Snapshot};

use super::config::SourceConfig;
use super::{FetchError, SnapshotFetcher};

/// Fetches a headed CSV document over HTTP and decodes it
#[derive(Debug, Clone)]
pub struct HttpCsvFetcher {
    client: reqwest::Client,
    url: String,
    max_body_bytes: usize,
}

impl HttpCsvFetcher {
    /// Build a fetcher from source configuration
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let url = config.resolve_url().ok_or_else(|| {
            Error::InvalidConfig("source needs either a url or an api_key".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(FetchError::from)?;

        Ok(Self {
            client,
            url,
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn download(&self) -> std::result::Result<Bytes, FetchError> {
        let mut response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let limit = self.max_body_bytes;
        let declared = response.content_length().unwrap_or(0);
        if declared > limit as u64 {
            return Err(FetchError::BodyTooLarge(limit));
        }

        // Content-Length is advisory; chunked bodies are counted as they arrive
        let mut body = BytesMut::with_capacity(declared as usize);
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::BodyTooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

impl SnapshotFetcher for HttpCsvFetcher {
    async fn fetch(&self) -> std::result::Result<Snapshot, FetchError> {
        let body = self.download().await?;
        let snapshot = parse_csv(&body)?;

        tracing::debug!(
            bytes = body.len(),
            records = snapshot.len(),
            "Fetched snapshot"
        );

        Ok(snapshot)
    }
}
