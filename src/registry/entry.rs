//! Subscriber entries
//!
//! An entry is the registry's view of one live connection: where to push
//! frames and how to ask the connection to close. The socket itself stays
//! with the connection task.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::DeliveryError;
use super::frame::{SubscriberId, UpdateFrame};

/// Entry for a single subscriber in the registry
///
/// Cheap to clone; clones share the same outbox and close token.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Unique subscriber id
    pub id: SubscriberId,

    /// Remote peer address, when known
    pub peer_addr: Option<SocketAddr>,

    /// When the subscriber registered
    pub connected_at: Instant,

    outbox: mpsc::Sender<UpdateFrame>,
    closed: CancellationToken,
}

impl Subscriber {
    pub(super) fn new(
        id: SubscriberId,
        peer_addr: Option<SocketAddr>,
        outbox: mpsc::Sender<UpdateFrame>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            outbox,
            closed,
        }
    }

    /// Push a frame into this subscriber's outbox
    ///
    /// Waits at most `timeout` for outbox space. A subscriber whose
    /// connection task has exited, or that has been asked to close, fails
    /// immediately.
    pub async fn deliver(
        &self,
        frame: UpdateFrame,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Disconnected);
        }

        match tokio::time::timeout(timeout, self.outbox.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Disconnected),
            Err(_) => Err(DeliveryError::TimedOut(timeout)),
        }
    }

    /// Ask the connection to close; idempotent
    pub(super) fn close(&self) {
        self.closed.cancel();
    }

    /// Check if the connection has been asked to close
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.outbox.is_closed()
    }
}

/// Everything a connection task needs after registering
#[derive(Debug)]
pub struct SubscriberRegistration {
    /// Assigned id, used to unregister
    pub id: SubscriberId,

    /// Frames queued for this subscriber
    pub outbox: mpsc::Receiver<UpdateFrame>,

    /// Cancelled when the registry drops the subscriber or shuts down
    pub closed: CancellationToken,
}
