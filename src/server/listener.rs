//! Relay server
//!
//! Serves the WebSocket endpoint and health routes, and runs the poll
//! scheduler alongside the listener for the lifetime of the server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::broadcast::Broadcaster;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::monitor::{CycleOutcome, SnapshotMonitor};
use crate::registry::{RegistryConfig, SubscriberRegistry};
use crate::scheduler::{PollConfig, Scheduler, SchedulerHandle};
use crate::server::config::ServerConfig;
use crate::server::connection::SubscriberConnection;
use crate::source::SnapshotFetcher;

/// Body of the root health response
pub const HEALTH_MESSAGE: &str = "snapshot relay with WebSocket is running";

/// Snapshot relay server
pub struct RelayServer<F: SnapshotFetcher> {
    config: Arc<ServerConfig>,
    poll: PollConfig,
    broadcaster: Arc<Broadcaster>,
    monitor: Arc<SnapshotMonitor<F>>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
struct EndpointState {
    config: Arc<ServerConfig>,
    broadcaster: Arc<Broadcaster>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<F: SnapshotFetcher> RelayServer<F> {
    /// Create a new server with default poll and registry configuration
    pub fn new(config: ServerConfig, fetcher: F) -> Self {
        Self::with_configs(
            config,
            PollConfig::default(),
            RegistryConfig::default(),
            fetcher,
        )
    }

    /// Create a server from a loaded [`RelayConfig`]
    pub fn from_config(config: &RelayConfig, fetcher: F) -> Self {
        Self::with_configs(
            config.server_config(),
            config.poll_config(),
            config.registry_config(),
            fetcher,
        )
    }

    /// Create a new server with custom component configuration
    pub fn with_configs(
        config: ServerConfig,
        poll: PollConfig,
        registry_config: RegistryConfig,
        fetcher: F,
    ) -> Self {
        let connection_semaphore = if config.max_subscribers > 0 {
            Some(Arc::new(Semaphore::new(config.max_subscribers)))
        } else {
            None
        };

        let registry = Arc::new(SubscriberRegistry::with_config(registry_config));
        let broadcaster = Arc::new(Broadcaster::new(registry));
        let monitor = Arc::new(SnapshotMonitor::new(fetcher, Arc::clone(&broadcaster)));

        Self {
            config: Arc::new(config),
            poll,
            broadcaster,
            monitor,
            connection_semaphore,
        }
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        self.broadcaster.registry()
    }

    /// Get a reference to the snapshot monitor
    pub fn monitor(&self) -> &Arc<SnapshotMonitor<F>> {
        &self.monitor
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the HTTP router (WebSocket endpoint, health routes, CORS)
    ///
    /// # Panics
    ///
    /// Panics if `ws_path` collides with another route. `serve` and
    /// `run_until` check this with [`ServerConfig::validate`] first.
    pub fn router(&self) -> Router {
        let state = EndpointState {
            config: Arc::clone(&self.config),
            broadcaster: Arc::clone(&self.broadcaster),
            connection_semaphore: self.connection_semaphore.clone(),
        };

        Router::new()
            .route("/", get(root))
            .route("/health", get(health_check))
            .route(&self.config.ws_path, get(subscribe))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config))
            .with_state(state)
    }

    /// Start the poll scheduler
    ///
    /// `run_until` and `serve` do this themselves; this is for embedding
    /// the monitor without the HTTP side.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        let monitor = Arc::clone(&self.monitor);

        Scheduler::start(self.poll.interval, move || {
            let monitor = Arc::clone(&monitor);
            async move {
                if let CycleOutcome::Broadcast(report) = monitor.poll_once().await? {
                    tracing::debug!(
                        delivered = report.delivered,
                        failed = report.failed,
                        "Poll cycle broadcast"
                    );
                }
                Ok(())
            }
        })
    }

    /// Bind the configured address and run until `shutdown` resolves
    pub async fn run_until<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Run on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown every subscriber is closed, then the scheduler is
    /// stopped after its in-flight cycle finishes.
    pub async fn serve<S>(&self, listener: TcpListener, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;

        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            path = %self.config.ws_path,
            "Relay server listening"
        );

        let scheduler = self.start_scheduler();
        let registry = Arc::clone(self.registry());

        let result = axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            registry.close_all();
        })
        .await;

        scheduler.shutdown().await;
        self.registry().close_all();

        result?;
        tracing::info!("Relay server stopped");
        Ok(())
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = if config.allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid allowed origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Root health endpoint
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": HEALTH_MESSAGE }))
}

/// Plain health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// WebSocket upgrade for subscribers
async fn subscribe(
    State(state): State<EndpointState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let peer_addr = connect_info.map(|ConnectInfo(addr)| addr);
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());

    if !state.config.origin_allowed(origin) {
        tracing::warn!(peer = ?peer_addr, origin = ?origin, "Connection rejected: origin not allowed");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    // Check subscriber limit
    let permit = match state.connection_semaphore {
        Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = ?peer_addr, "Connection rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "subscriber limit reached")
                    .into_response();
            }
        },
        None => None,
    };

    tracing::debug!(peer = ?peer_addr, "New WebSocket connection");

    ws.on_upgrade(move |socket| async move {
        let _permit = permit;
        SubscriberConnection::new(peer_addr, state.broadcaster, state.config)
            .run(socket)
            .await;
    })
}
