//! Last-accepted snapshot storage
//!
//! Holds the most recent snapshot that was considered a change. The value
//! is swapped as a whole `Arc`, so any reader sees either the old snapshot
//! or the new one, never something in between.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::record::Snapshot;

/// Compare-and-swap holder for the last accepted snapshot
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<Snapshot>,
}

impl SnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `next` if it differs structurally from the current snapshot
    ///
    /// Returns `true` when the store changed. An empty store always changes.
    pub fn compare_and_swap(&self, next: Arc<Snapshot>) -> bool {
        let mut changed = false;

        self.current.rcu(|current| {
            if current.as_deref() == Some(next.as_ref()) {
                changed = false;
                current.clone()
            } else {
                changed = true;
                Some(Arc::clone(&next))
            }
        });

        if changed {
            tracing::debug!(snapshot = %next, "Snapshot replaced");
        }

        changed
    }

    /// Get the current snapshot, if any
    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Check if a snapshot has been accepted yet
    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }
}
