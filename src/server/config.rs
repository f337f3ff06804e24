//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default port for the relay
pub const DEFAULT_PORT: u16 = 8000;

/// Routes served alongside the WebSocket endpoint
pub const RESERVED_PATHS: [&str; 2] = ["/", "/health"];

/// Shortest allowed interval between server pings
pub const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path of the WebSocket endpoint
    pub ws_path: String,

    /// Browser origins allowed to connect (empty = any)
    pub allowed_origins: Vec<String>,

    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_subscribers: usize,

    /// Interval between server pings on idle connections
    pub ping_interval: Duration,

    /// Maximum time a single socket write may take
    pub write_timeout: Duration,

    /// Send the last broadcast frame to subscribers as soon as they connect
    pub catchup_on_connect: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            ws_path: "/ws".to_string(),
            allowed_origins: vec!["http://localhost:5173".to_string()],
            max_subscribers: 0, // Unlimited
            ping_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            catchup_on_connect: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the WebSocket path
    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.ws_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Replace the allowed origins
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Set maximum subscribers
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }

    /// Set the ping interval, raised to at least [`MIN_PING_INTERVAL`]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(MIN_PING_INTERVAL);
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Disable catch-up frames for new subscribers
    pub fn disable_catchup(mut self) -> Self {
        self.catchup_on_connect = false;
        self
    }

    /// Check that the WebSocket path can be routed
    ///
    /// The path must be absolute, must not shadow the health routes, and
    /// must not contain route parameters or wildcards.
    pub fn validate(&self) -> Result<()> {
        let path = self.ws_path.as_str();
        let has_pattern = path.contains(|c| matches!(c, ':' | '*' | '{' | '}'));

        if !path.starts_with('/') || RESERVED_PATHS.contains(&path) || has_pattern {
            return Err(Error::InvalidConfig(format!(
                "server.ws_path {:?} must be an absolute path other than {:?} without route patterns",
                path, RESERVED_PATHS
            )));
        }

        Ok(())
    }

    /// Check an `Origin` header value against the allow list
    ///
    /// Requests without an origin (non-browser clients) are allowed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allowed_origins.is_empty() => true,
            Some(origin) => self.allowed_origins.iter().any(|o| o == origin),
        }
    }
}
