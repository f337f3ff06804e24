//! Snapshot fan-out
//!
//! The broadcaster encodes a snapshot once and pushes the frame to every
//! registered subscriber concurrently. A subscriber that cannot take the
//! frame within the delivery timeout is evicted; nobody else waits on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures::future::join_all;

use crate::error::Result;
use crate::registry::{SubscriberRegistry, UpdateFrame};
use crate::snapshot::Snapshot;

/// Outcome of one broadcast cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers in the membership snapshot
    pub attempted: usize,
    /// Deliveries that reached the subscriber's outbox
    pub delivered: usize,
    /// Deliveries that failed; those subscribers were unregistered
    pub failed: usize,
}

/// Delivers snapshots to every registered subscriber
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    delivery_timeout: Duration,
    latest: ArcSwapOption<UpdateFrame>,
    sequence: AtomicU64,
}

impl Broadcaster {
    /// Create a broadcaster using the registry's delivery timeout
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        let delivery_timeout = registry.config().delivery_timeout;

        Self {
            registry,
            delivery_timeout,
            latest: ArcSwapOption::empty(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Get the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Last frame that was broadcast, for late joiners
    pub fn latest(&self) -> Option<UpdateFrame> {
        self.latest.load_full().map(|frame| (*frame).clone())
    }

    /// Deliver `snapshot` to every currently registered subscriber
    ///
    /// Fails only if the snapshot cannot be encoded. Individual delivery
    /// failures are handled by unregistering the subscriber.
    pub async fn broadcast(&self, snapshot: &Snapshot) -> Result<BroadcastReport> {
        let frame = UpdateFrame::new_data(snapshot)?;
        Ok(self.broadcast_frame(frame).await)
    }

    /// Deliver an already encoded frame
    ///
    /// The frame gets the next sequence number and becomes [`latest`]
    /// before any subscriber sees it.
    ///
    /// [`latest`]: Self::latest
    pub async fn broadcast_frame(&self, frame: UpdateFrame) -> BroadcastReport {
        let frame = frame.with_sequence(self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
        self.latest.store(Some(Arc::new(frame.clone())));

        let members = self.registry.snapshot();
        let timeout = self.delivery_timeout;

        let results = join_all(members.iter().map(|subscriber| {
            let frame = frame.clone();
            async move { (subscriber.id, subscriber.deliver(frame, timeout).await) }
        }))
        .await;

        let mut report = BroadcastReport {
            attempted: members.len(),
            ..Default::default()
        };

        for (id, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        subscriber = %id,
                        error = %e,
                        "Delivery failed, dropping subscriber"
                    );
                    self.registry.unregister(id);
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            bytes = frame.len(),
            "Broadcast complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::registry::RegistryConfig;

    fn snapshot(val: i64) -> Snapshot {
        Snapshot::new(["id", "val"]).with_row([1, val])
    }

    fn broadcaster(timeout: Duration) -> Broadcaster {
        let config = RegistryConfig::default()
            .outbox_capacity(1)
            .delivery_timeout(timeout);
        Broadcaster::new(Arc::new(SubscriberRegistry::with_config(config)))
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let broadcaster = broadcaster(Duration::from_secs(1));
        let mut regs: Vec<_> = (0..3)
            .map(|_| broadcaster.registry().register(None))
            .collect();

        let report = broadcaster.broadcast(&snapshot(10)).await.unwrap();
        assert_eq!(
            report,
            BroadcastReport {
                attempted: 3,
                delivered: 3,
                failed: 0
            }
        );

        let expected = UpdateFrame::new_data(&snapshot(10)).unwrap();
        for reg in regs.iter_mut() {
            assert_eq!(reg.outbox.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_broadcast_with_no_subscribers() {
        let broadcaster = broadcaster(Duration::from_secs(1));

        let report = broadcaster.broadcast(&snapshot(10)).await.unwrap();
        assert_eq!(report, BroadcastReport::default());
        assert!(broadcaster.latest().is_some());
    }

    #[tokio::test]
    async fn test_failed_subscriber_is_pruned() {
        let broadcaster = broadcaster(Duration::from_secs(1));
        let mut alive = broadcaster.registry().register(None);
        let dead = broadcaster.registry().register(None);
        let dead_id = dead.id;
        drop(dead);

        let report = broadcaster.broadcast(&snapshot(10)).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert!(!broadcaster.registry().contains(dead_id));
        assert!(broadcaster.registry().contains(alive.id));
        assert!(alive.outbox.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_subscriber_is_bounded_by_timeout() {
        let timeout = Duration::from_millis(200);
        let broadcaster = broadcaster(timeout);

        // Outbox capacity is 1 and this subscriber never drains it
        let stalled = broadcaster.registry().register(None);
        let mut healthy = broadcaster.registry().register(None);

        broadcaster.broadcast(&snapshot(1)).await.unwrap();
        healthy.outbox.recv().await.unwrap();

        let started = Instant::now();
        let report = broadcaster.broadcast(&snapshot(2)).await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed <= timeout + Duration::from_millis(50));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert!(!broadcaster.registry().contains(stalled.id));
        assert!(stalled.closed.is_cancelled());

        let expected = UpdateFrame::new_data(&snapshot(2)).unwrap();
        assert_eq!(healthy.outbox.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_concurrent_eviction_is_harmless() {
        let config = RegistryConfig::default().outbox_capacity(2);
        let broadcaster = Broadcaster::new(Arc::new(SubscriberRegistry::with_config(config)));
        let mut alive = broadcaster.registry().register(None);
        let dead = broadcaster.registry().register(None);
        let dead_id = dead.id;
        drop(dead);

        let (s1, s2) = (snapshot(1), snapshot(2));
        let (a, b) = tokio::join!(broadcaster.broadcast(&s1), broadcaster.broadcast(&s2));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(a.failed + b.failed >= 1);
        assert_eq!(a.delivered + b.delivered, 2);
        assert!(!broadcaster.registry().unregister(dead_id));
        assert_eq!(broadcaster.registry().len(), 1);

        assert!(alive.outbox.recv().await.is_some());
        assert!(alive.outbox.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_latest_tracks_last_broadcast() {
        let broadcaster = broadcaster(Duration::from_secs(1));
        assert!(broadcaster.latest().is_none());

        broadcaster.broadcast(&snapshot(1)).await.unwrap();
        broadcaster.broadcast(&snapshot(2)).await.unwrap();

        let latest = broadcaster.latest().unwrap();
        assert_eq!(latest, UpdateFrame::new_data(&snapshot(2)).unwrap());
        assert_eq!(latest.sequence(), 2);
    }
}
