//! Startup configuration loading
//!
//! Sources are merged in order, later ones winning:
//! 1. Code defaults
//! 2. TOML file named by `CONFIG_PATH` (if set)
//! 3. Environment variables with the `RELAY__` prefix, e.g.
//!    `RELAY__POLL__INTERVAL_SECS=30` or
//!    `RELAY__SERVER__ALLOWED_ORIGINS=http://a.test,http://b.test`
//!
//! `FIRMS_API_KEY` is read last as a fallback for `source.api_key`.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::RegistryConfig;
use crate::scheduler::PollConfig;
use crate::server::ServerConfig;
use crate::source::config::SourceConfig;

/// Environment variable naming an optional config file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Fallback environment variable for the FIRMS map key
pub const API_KEY_ENV: &str = "FIRMS_API_KEY";

const ENV_PREFIX: &str = "RELAY";

/// Complete relay configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerSection,
    pub poll: PollSection,
    pub registry: RegistrySection,
    pub source: SourceSection,
}

/// HTTP and WebSocket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: SocketAddr,
    pub ws_path: String,
    pub allowed_origins: Vec<String>,
    pub max_subscribers: usize,
    pub ping_interval_secs: u64,
    pub write_timeout_ms: u64,
    pub catchup_on_connect: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_addr: defaults.bind_addr,
            ws_path: defaults.ws_path,
            allowed_origins: defaults.allowed_origins,
            max_subscribers: defaults.max_subscribers,
            ping_interval_secs: defaults.ping_interval.as_secs(),
            write_timeout_ms: defaults.write_timeout.as_millis() as u64,
            catchup_on_connect: defaults.catchup_on_connect,
        }
    }
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    pub interval_secs: u64,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_secs: PollConfig::default().interval.as_secs(),
        }
    }
}

/// Subscriber registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub outbox_capacity: usize,
    pub delivery_timeout_ms: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        let defaults = RegistryConfig::default();
        Self {
            outbox_capacity: defaults.outbox_capacity,
            delivery_timeout_ms: defaults.delivery_timeout.as_millis() as u64,
        }
    }
}

/// Upstream source settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub product: String,
    pub country: String,
    pub day_range: u8,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for SourceSection {
    fn default() -> Self {
        let defaults = SourceConfig::default();
        Self {
            url: defaults.url,
            api_key: defaults.api_key,
            product: defaults.product,
            country: defaults.country,
            day_range: defaults.day_range,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            max_body_bytes: defaults.max_body_bytes,
        }
    }
}

impl RelayConfig {
    /// Load configuration from all sources without validating it
    ///
    /// Call [`validate`](Self::validate) before using the result.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins"),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if config.source.api_key.is_none() {
            config.source.api_key = env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }

    /// Check the loaded values and return them if usable
    pub fn validate(self) -> Result<Self> {
        if self.poll.interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "poll.interval_secs must be greater than 0".into(),
            ));
        }

        if self.registry.outbox_capacity == 0 {
            return Err(Error::InvalidConfig(
                "registry.outbox_capacity must be greater than 0".into(),
            ));
        }

        if self.registry.delivery_timeout_ms == 0 || self.server.write_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be greater than 0".into()));
        }

        if self.server.ping_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "server.ping_interval_secs must be greater than 0".into(),
            ));
        }

        self.server_config().validate()?;

        if let Some(origin) = self
            .server
            .allowed_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(Error::InvalidConfig(format!(
                "server.allowed_origins contains invalid origin {:?}",
                origin
            )));
        }

        if self.source_config().resolve_url().is_none() {
            return Err(Error::InvalidConfig(format!(
                "no source: set source.url, source.api_key or {}",
                API_KEY_ENV
            )));
        }

        Ok(self)
    }

    /// Server settings as a [`ServerConfig`]
    pub fn server_config(&self) -> ServerConfig {
        let s = &self.server;
        let config = ServerConfig::with_addr(s.bind_addr)
            .ws_path(s.ws_path.clone())
            .allowed_origins(s.allowed_origins.iter().cloned())
            .max_subscribers(s.max_subscribers)
            .ping_interval(Duration::from_secs(s.ping_interval_secs))
            .write_timeout(Duration::from_millis(s.write_timeout_ms));

        if s.catchup_on_connect {
            config
        } else {
            config.disable_catchup()
        }
    }

    /// Poll settings as a [`PollConfig`]
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::default().interval(Duration::from_secs(self.poll.interval_secs))
    }

    /// Registry settings as a [`RegistryConfig`]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default()
            .outbox_capacity(self.registry.outbox_capacity)
            .delivery_timeout(Duration::from_millis(self.registry.delivery_timeout_ms))
    }

    /// Source settings as a [`SourceConfig`]
    pub fn source_config(&self) -> SourceConfig {
        let s = &self.source;
        let mut config = SourceConfig::default()
            .product(s.product.clone())
            .country(s.country.clone())
            .day_range(s.day_range)
            .request_timeout(Duration::from_secs(s.request_timeout_secs))
            .max_body_bytes(s.max_body_bytes);
        config.url = s.url.clone();
        config.api_key = s.api_key.clone();
        config
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("server", &self.server)
            .field("poll", &self.poll)
            .field("registry", &self.registry)
            .field("source", &self.source_config())
            .finish()
    }
}
