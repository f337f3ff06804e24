//! WebSocket relay server
//!
//! [`RelayServer`] owns the HTTP router and the poll scheduler. Each
//! accepted WebSocket is handed to a [`SubscriberConnection`] task.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::SubscriberConnection;
pub use listener::{RelayServer, HEALTH_MESSAGE};
