//! Registry configuration

use std::time::Duration;

/// Configuration for subscriber outboxes and delivery
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Frames buffered per subscriber before delivery starts waiting
    pub outbox_capacity: usize,

    /// How long a single delivery may wait for outbox space
    pub delivery_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 4,
            delivery_timeout: Duration::from_secs(2),
        }
    }
}

impl RegistryConfig {
    /// Set the per-subscriber outbox capacity (minimum 1)
    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity.max(1);
        self
    }

    /// Set the delivery timeout
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}
