//! Poll cycle: fetch, diff, broadcast

use std::sync::Arc;

use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::error::Result;
use crate::snapshot::SnapshotStore;
use crate::source::SnapshotFetcher;

/// What a poll cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetched snapshot matched the last one; nothing was sent
    Unchanged,
    /// Fetched snapshot was new and was broadcast
    Broadcast(BroadcastReport),
}

/// Watches a source and fans out changes
pub struct SnapshotMonitor<F: SnapshotFetcher> {
    fetcher: F,
    store: SnapshotStore,
    broadcaster: Arc<Broadcaster>,
}

impl<F: SnapshotFetcher> SnapshotMonitor<F> {
    /// Create a monitor with an empty snapshot store
    pub fn new(fetcher: F, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            fetcher,
            store: SnapshotStore::new(),
            broadcaster,
        }
    }

    /// Last accepted snapshot
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Broadcaster used for changes
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Run one fetch-and-compare pass
    ///
    /// A fetch failure leaves the stored snapshot untouched and is returned
    /// to the caller; the scheduler logs it and waits for the next tick.
    pub async fn poll_once(&self) -> Result<CycleOutcome> {
        let snapshot = Arc::new(self.fetcher.fetch().await?);

        if !self.store.compare_and_swap(Arc::clone(&snapshot)) {
            tracing::debug!(snapshot = %snapshot, "No change detected");
            return Ok(CycleOutcome::Unchanged);
        }

        tracing::info!(snapshot = %snapshot, "New data detected");
        let report = self.broadcaster.broadcast(&snapshot).await?;

        Ok(CycleOutcome::Broadcast(report))
    }
}
