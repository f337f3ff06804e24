//! Subscriber identity and the frames pushed to subscribers

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::snapshot::Snapshot;

/// Event tag carried by every data-update frame
pub const NEW_DATA_EVENT: &str = "new_data";

/// Unique identifier for a subscriber, assigned monotonically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Wire shape of an update event
///
/// `data` is the records array encoded as a JSON string, so clients decode
/// it in a second step.
#[derive(Debug, Serialize)]
struct UpdateEvent<'a> {
    event: &'a str,
    data: String,
}

/// An encoded frame ready to be pushed to subscribers
///
/// Encoded once per broadcast; cloning only bumps a reference count, so
/// every subscriber's outbox shares the same allocation. Frames compare by
/// payload; the sequence only orders broadcasts.
#[derive(Debug, Clone)]
pub struct UpdateFrame {
    payload: Arc<str>,
    sequence: u64,
}

impl PartialEq for UpdateFrame {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl Eq for UpdateFrame {}

impl UpdateFrame {
    /// Encode a `new_data` event for the snapshot
    pub fn new_data(snapshot: &Snapshot) -> serde_json::Result<Self> {
        let event = UpdateEvent {
            event: NEW_DATA_EVENT,
            data: snapshot.to_records_json()?,
        };

        Ok(Self {
            payload: serde_json::to_string(&event)?.into(),
            sequence: 0,
        })
    }

    /// Stamp the broadcast sequence number
    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Broadcast sequence number; 0 until broadcast, then increasing
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encoded JSON text
    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_data_shape() {
        let snap = Snapshot::new(["id", "val"]).with_row([1i64, 10]);
        let frame = UpdateFrame::new_data(&snap).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(frame.as_str()).unwrap();
        assert_eq!(parsed["event"], "new_data");

        let data = parsed["data"].as_str().unwrap();
        let rows: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(rows, serde_json::json!([{ "id": 1, "val": 10 }]));
    }

    #[test]
    fn test_clone_shares_payload() {
        let snap = Snapshot::new(["id"]).with_row([1i64]);
        let frame = UpdateFrame::new_data(&snap).unwrap();
        let copy = frame.clone();

        assert!(Arc::ptr_eq(&frame.payload, &copy.payload));
    }

    #[test]
    fn test_sequence_does_not_affect_equality() {
        let snap = Snapshot::new(["id"]).with_row([1i64]);
        let frame = UpdateFrame::new_data(&snap).unwrap();
        assert_eq!(frame.sequence(), 0);

        let stamped = frame.clone().with_sequence(9);
        assert_eq!(stamped.sequence(), 9);
        assert_eq!(frame, stamped);
    }

    #[test]
    fn test_subscriber_id_display() {
        assert_eq!(SubscriberId(7).to_string(), "sub-7");
    }
}
