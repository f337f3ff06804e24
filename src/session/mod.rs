//! Subscriber session state
//!
//! Per-connection lifecycle tracking, kept separate from the socket loop so
//! transitions can be tested without a network.

pub mod state;

pub use state::{CloseReason, ConnectionPhase, ConnectionState};
