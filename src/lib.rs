//! Snapshot relay
//!
//! Polls a tabular data source on a fixed interval, detects when the
//! snapshot changed, and pushes the new snapshot to every connected
//! WebSocket subscriber.
//!
//! ```text
//!   Scheduler ──tick──► SnapshotMonitor::poll_once
//!                           │ fetch (SnapshotFetcher)
//!                           │ compare_and_swap (SnapshotStore)
//!                           ▼ changed?
//!                       Broadcaster ──► SubscriberRegistry ──► connections
//! ```
//!
//! # Example
//!
//! ```no_run
//! use snapshot_relay::source::{HttpCsvFetcher, SourceConfig};
//! use snapshot_relay::{RelayServer, ServerConfig};
//!
//! # async fn run() -> snapshot_relay::Result<()> {
//! let fetcher = HttpCsvFetcher::new(&SourceConfig::with_url("http://localhost:9000/data.csv"))?;
//! let server = RelayServer::new(ServerConfig::default(), fetcher);
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod source;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use config::RelayConfig;
pub use error::{Error, Result};
pub use monitor::{CycleOutcome, SnapshotMonitor};
pub use registry::{SubscriberId, SubscriberRegistry, UpdateFrame};
pub use scheduler::{PollConfig, Scheduler, SchedulerHandle};
pub use server::{RelayServer, ServerConfig};
pub use snapshot::{Snapshot, SnapshotStore};
pub use source::{FetchError, HttpCsvFetcher, SnapshotFetcher};
