//! Snapshot model and change detection
//!
//! A [`Snapshot`] is one complete tabular capture from the upstream source.
//! The [`SnapshotStore`] remembers the last one that was accepted and
//! decides whether a freshly fetched capture is a change.

pub mod decode;
pub mod record;
pub mod store;

pub use decode::parse_csv;
pub use record::{Record, Snapshot, Value};
pub use store::SnapshotStore;
