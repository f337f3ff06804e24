//! Connection state machine
//!
//! Tracks a subscriber connection from upgrade to close.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::registry::SubscriberId;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// WebSocket upgrade accepted, not yet registered
    Connecting,
    /// Registered and receiving updates
    Open,
    /// Unregistered, socket released
    Closed,
}

/// Why a connection ended
///
/// Every cause ends in the same `Closed` transition; the reason is only
/// kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or the stream ended
    PeerClosed,
    /// Reading from the socket failed
    ReadError(String),
    /// Writing to the socket failed or timed out
    WriteError(String),
    /// Dropped by the registry, e.g. after a failed delivery
    Evicted,
    /// Server is shutting down
    Shutdown,
}

impl CloseReason {
    /// Check if the close was initiated by the peer side
    pub fn is_remote(&self) -> bool {
        matches!(self, CloseReason::PeerClosed | CloseReason::ReadError(_))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::ReadError(e) => write!(f, "read error: {}", e),
            CloseReason::WriteError(e) => write!(f, "write error: {}", e),
            CloseReason::Evicted => write!(f, "evicted"),
            CloseReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Complete connection state
#[derive(Debug)]
pub struct ConnectionState {
    /// Subscriber id (after registration)
    pub subscriber_id: Option<SubscriberId>,

    /// Remote peer address
    pub peer_addr: Option<SocketAddr>,

    /// Current phase
    pub phase: ConnectionPhase,

    /// Upgrade time
    pub connected_at: Instant,

    /// Time when the connection was registered
    pub opened_at: Option<Instant>,

    /// Why the connection closed
    pub close_reason: Option<CloseReason>,

    /// Update frames written to the socket
    pub frames_sent: u64,

    /// Bytes of update frames written
    pub bytes_sent: u64,

    /// Inbound messages received (all ignored)
    pub messages_received: u64,
}

impl ConnectionState {
    /// Create a new connection state
    pub fn new(peer_addr: Option<SocketAddr>) -> Self {
        Self {
            subscriber_id: None,
            peer_addr,
            phase: ConnectionPhase::Connecting,
            connected_at: Instant::now(),
            opened_at: None,
            close_reason: None,
            frames_sent: 0,
            bytes_sent: 0,
            messages_received: 0,
        }
    }

    /// Transition to open after registering
    pub fn open(&mut self, id: SubscriberId) {
        if self.phase == ConnectionPhase::Connecting {
            self.subscriber_id = Some(id);
            self.phase = ConnectionPhase::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    /// Transition to closed
    ///
    /// Only the first reason is kept; later calls are no-ops.
    pub fn close(&mut self, reason: CloseReason) {
        if self.phase != ConnectionPhase::Closed {
            self.phase = ConnectionPhase::Closed;
            self.close_reason = Some(reason);
        }
    }

    /// Record a frame written to the peer
    pub fn record_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Check if the connection is open
    pub fn is_open(&self) -> bool {
        self.phase == ConnectionPhase::Open
    }

    /// Get connection duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
