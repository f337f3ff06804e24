//! Delivery error types

use std::time::Duration;

/// Failure delivering a frame to one subscriber
///
/// Never propagated past the broadcaster: the subscriber is unregistered
/// and everyone else carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's connection task is gone
    #[error("subscriber disconnected")]
    Disconnected,

    /// The subscriber did not drain its outbox in time
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
}
