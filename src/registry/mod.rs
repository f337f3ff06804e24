//! Subscriber registry for snapshot fan-out
//!
//! The registry tracks every live subscriber connection. Each subscriber
//! gets a bounded outbox; the broadcaster pushes encoded frames into the
//! outboxes and the connection task drains its own outbox onto the socket.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SubscriberRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ subscribers: BTreeMap<Id,    │
//!                  │   Subscriber {               │
//!                  │     outbox: mpsc::Sender,    │
//!                  │     closed: CancelToken,     │
//!                  │   }                          │
//!                  │ >                            │
//!                  └──────────────┬───────────────┘
//!                                 │ snapshot()
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!   [Connection]            [Connection]            [Connection]
//!   outbox.recv()           outbox.recv()           outbox.recv()
//!         │                       │                       │
//!         └──► socket.send() ◄────┴───── Broadcaster::broadcast()
//! ```
//!
//! # Ownership
//!
//! Only the connection task touches its socket. The registry and the
//! broadcaster push into a channel or cancel a token, both of which are
//! idempotent, so racing evictions can never close a socket twice.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{Subscriber, SubscriberRegistration};
pub use error::DeliveryError;
pub use frame::{SubscriberId, UpdateFrame, NEW_DATA_EVENT};
pub use store::SubscriberRegistry;
