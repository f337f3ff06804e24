//! snapshot-relay binary
//!
//! Configuration comes from `CONFIG_PATH`, `RELAY__*` variables and
//! `FIRMS_API_KEY`. Log level follows `RUST_LOG` (default `info`).

use snapshot_relay::{HttpCsvFetcher, RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::new()?.validate()?;
    tracing::debug!(config = ?config, "Configuration loaded");

    let fetcher = HttpCsvFetcher::new(&config.source_config())?;
    let server = RelayServer::from_config(&config, fetcher);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
