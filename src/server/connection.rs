//! Subscriber connection handling
//!
//! One task per WebSocket. The task is the only owner of its socket: it
//! drains the subscriber's outbox onto the wire, answers liveness traffic,
//! and releases everything when the connection reaches `Closed`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::registry::{SubscriberRegistration, UpdateFrame};
use crate::server::config::{ServerConfig, MIN_PING_INTERVAL};
use crate::session::{CloseReason, ConnectionState};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Newest broadcast sequence written to the peer
///
/// A broadcast racing registration can leave frames in the outbox that
/// repeat or predate the catch-up frame. Those are skipped so a peer never
/// sees data go backwards.
#[derive(Debug, Default)]
struct SentCursor(u64);

impl SentCursor {
    /// Accept `frame` if it is newer than anything sent so far
    fn advance(&mut self, frame: &UpdateFrame) -> bool {
        if frame.sequence() > self.0 {
            self.0 = frame.sequence();
            true
        } else {
            false
        }
    }
}

/// A single subscriber connection
pub struct SubscriberConnection {
    state: ConnectionState,
    broadcaster: Arc<Broadcaster>,
    config: Arc<ServerConfig>,
}

impl SubscriberConnection {
    /// Create a connection in the `Connecting` phase
    pub fn new(
        peer_addr: Option<SocketAddr>,
        broadcaster: Arc<Broadcaster>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            state: ConnectionState::new(peer_addr),
            broadcaster,
            config,
        }
    }

    /// Register, serve until closed, then unregister
    ///
    /// Returns the final connection state.
    pub async fn run(mut self, socket: WebSocket) -> ConnectionState {
        let registry = Arc::clone(self.broadcaster.registry());

        let SubscriberRegistration {
            id,
            mut outbox,
            closed,
        } = registry.register(self.state.peer_addr);
        self.state.open(id);

        let (mut sink, mut stream) = socket.split();
        let reason = self
            .serve(&mut sink, &mut stream, &mut outbox, &closed)
            .await;

        self.state.close(reason);
        registry.unregister(id);

        // Best effort close frame; the peer may already be gone
        let _ = sink.close().await;

        if let Some(ref reason) = self.state.close_reason {
            tracing::info!(
                subscriber = %id,
                peer = ?self.state.peer_addr,
                reason = %reason,
                remote = reason.is_remote(),
                frames_sent = self.state.frames_sent,
                duration_secs = self.state.duration().as_secs(),
                "Subscriber disconnected"
            );
        }

        self.state
    }

    async fn serve(
        &mut self,
        sink: &mut WsSink,
        stream: &mut WsStream,
        outbox: &mut mpsc::Receiver<UpdateFrame>,
        closed: &CancellationToken,
    ) -> CloseReason {
        // Registered before reading, so a concurrent broadcast is either
        // already in `latest` or will land in the outbox afterwards.
        let mut cursor = SentCursor::default();
        if self.config.catchup_on_connect {
            if let Some(frame) = self.broadcaster.latest() {
                cursor.advance(&frame);
                if let Err(reason) = self.send_frame(sink, &frame).await {
                    return reason;
                }
            }
        }

        let period = self.config.ping_interval.max(MIN_PING_INTERVAL);
        let mut ping = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                biased;

                _ = closed.cancelled() => {
                    return if self.broadcaster.registry().is_closed() {
                        CloseReason::Shutdown
                    } else {
                        CloseReason::Evicted
                    };
                }

                frame = outbox.recv() => match frame {
                    Some(frame) => {
                        if !cursor.advance(&frame) {
                            continue;
                        }
                        if let Err(reason) = self.send_frame(sink, &frame).await {
                            return reason;
                        }
                    }
                    None => return CloseReason::Evicted,
                },

                msg = stream.next() => match msg {
                    None | Some(Ok(Message::Close(_))) => return CloseReason::PeerClosed,
                    Some(Ok(_)) => {
                        // Text, binary, ping and pong only prove liveness
                        self.state.messages_received += 1;
                    }
                    Some(Err(e)) => return CloseReason::ReadError(e.to_string()),
                },

                _ = ping.tick() => {
                    if let Err(reason) = self.write(sink, Message::Ping(Vec::new())).await {
                        return reason;
                    }
                }
            }
        }
    }

    async fn send_frame(
        &mut self,
        sink: &mut WsSink,
        frame: &UpdateFrame,
    ) -> Result<(), CloseReason> {
        self.write(sink, Message::Text(frame.as_str().to_owned()))
            .await?;
        self.state.record_sent(frame.len());
        Ok(())
    }

    async fn write(&self, sink: &mut WsSink, message: Message) -> Result<(), CloseReason> {
        match tokio::time::timeout(self.config.write_timeout, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CloseReason::WriteError(e.to_string())),
            Err(_) => Err(CloseReason::WriteError(format!(
                "write timed out after {:?}",
                self.config.write_timeout
            ))),
        }
    }
}
