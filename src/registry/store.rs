//! Subscriber registry implementation
//!
//! The central set of live subscribers. Connection tasks register and
//! unregister themselves; the broadcaster takes point-in-time copies and
//! evicts subscribers that fail delivery.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::config::RegistryConfig;
use super::entry::{Subscriber, SubscriberRegistration};
use super::frame::SubscriberId;

/// Central registry for all live subscribers
///
/// Thread-safe via a short-lived `RwLock`. No lock is ever held across an
/// await point, so a slow delivery cannot block registrations.
pub struct SubscriberRegistry {
    /// Live subscribers ordered by id
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,

    /// Next id to hand out
    next_id: AtomicU64,

    /// Parent of every subscriber's close token
    shutdown: CancellationToken,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriberRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new subscriber
    ///
    /// After [`close_all`](Self::close_all) the returned registration is
    /// already closed and the subscriber is not added.
    pub fn register(&self, peer_addr: Option<SocketAddr>) -> SubscriberRegistration {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.outbox_capacity);
        let closed = self.shutdown.child_token();

        let subscriber = Subscriber::new(id, peer_addr, tx, closed.clone());

        let total = {
            let mut subscribers = self.subscribers.write();
            if self.shutdown.is_cancelled() {
                None
            } else {
                subscribers.insert(id, subscriber);
                Some(subscribers.len())
            }
        };

        match total {
            Some(total) => tracing::info!(
                subscriber = %id,
                peer = ?peer_addr,
                subscribers = total,
                "Subscriber registered"
            ),
            None => tracing::debug!(subscriber = %id, "Registry closed, registration rejected"),
        }

        SubscriberRegistration {
            id,
            outbox: rx,
            closed,
        }
    }

    /// Unregister a subscriber
    ///
    /// Idempotent: returns `false` if the subscriber was already gone.
    /// Removal asks the subscriber's connection to close.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id);

        match removed {
            Some(subscriber) => {
                subscriber.close();
                tracing::info!(
                    subscriber = %id,
                    subscribers = self.len(),
                    "Subscriber unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the live subscribers, ordered by id
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Check if a subscriber is registered
    #[cfg(test)]
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Number of live subscribers
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Check if there are no live subscribers
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Close every connection and reject future registrations
    pub fn close_all(&self) {
        let drained = {
            let mut subscribers = self.subscribers.write();
            self.shutdown.cancel();
            std::mem::take(&mut *subscribers)
        };

        if !drained.is_empty() {
            tracing::info!(subscribers = drained.len(), "Closing all subscribers");
        }
    }

    /// Check if [`close_all`](Self::close_all) has been called
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_register_assigns_increasing_ids() {
        let registry = SubscriberRegistry::new();

        let a = registry.register(None);
        let b = registry.register(None);

        assert!(a.id < b.id);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a.id));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let a = registry.register(None);
        let b = registry.register(None);

        assert!(registry.unregister(a.id));
        assert!(!registry.unregister(a.id));

        // Other subscribers unaffected
        assert!(registry.contains(b.id));
        assert!(!b.closed.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_closes_connection() {
        let registry = SubscriberRegistry::new();
        let a = registry.register(None);

        registry.unregister(a.id);
        assert!(a.closed.is_cancelled());
    }

    #[test]
    fn test_snapshot_is_ordered_point_in_time_copy() {
        let registry = SubscriberRegistry::new();
        let ids: Vec<_> = (0..5).map(|_| registry.register(None)).collect();

        let snapshot = registry.snapshot();
        registry.unregister(ids[0].id);
        let _late = registry.register(None);

        let snapshot_ids: Vec<_> = snapshot.iter().map(|s| s.id).collect();
        let expected: Vec<_> = ids.iter().map(|r| r.id).collect();
        assert_eq!(snapshot_ids, expected);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_close_all() {
        let registry = SubscriberRegistry::new();
        let a = registry.register(None);
        let b = registry.register(None);

        registry.close_all();

        assert!(registry.is_empty());
        assert!(registry.is_closed());
        assert!(a.closed.is_cancelled());
        assert!(b.closed.is_cancelled());

        // Late registrations are born closed and never tracked
        let late = registry.register(None);
        assert!(late.closed.is_cancelled());
        assert!(!registry.contains(late.id));
    }

    #[tokio::test]
    async fn test_concurrent_register_unregister() {
        let registry = Arc::new(SubscriberRegistry::new());

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let reg = registry.register(None);
                    tokio::task::yield_now().await;
                    registry.unregister(reg.id);
                    registry.unregister(reg.id);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert!(registry.is_empty());
    }
}
