//! Stock Feed Binary
//!
//! Starts the price API, the WebSocket feed and the update scheduler.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stock-feed
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOCKS_API_KEY`: Alpha Vantage API key
//!
//! ## Optional
//! - `STOCKS_API_URL`: Quote origin endpoint (default: <https://www.alphavantage.co/query>)
//! - `STOCKS_API_TIMEOUT_SECS`: Origin request timeout (default: 10)
//! - `DATABASE_URL`: Price store (default: sqlite://stock-feed.db)
//! - `DATABASE_MAX_CONNECTIONS`: Store pool size (default: 5)
//! - `STOCK_UPDATE_INTERVAL_MS`: Scheduler interval (default: 1000)
//! - `STOCK_UPDATE_MAX_PERCENTAGE_CHANGE`: Per-tick change bound (default: 0.02)
//! - `STOCK_FEED_HTTP_PORT`: HTTP and WebSocket port (default: 8080)
//! - `STOCK_FEED_CONNECTION_BUFFER`: Per-connection queue (default: 256)
//! - `STOCK_FEED_GROUP_CAPACITY`: Per-ticker group capacity (default: 64)
//! - `STOCK_FEED_MAX_GROUPS_PER_CONNECTION`: Tickers one feed client may join (default: 50)
//! - `STOCK_FEED_CORS_ALLOWED_ORIGIN`: Browser origin allowed by CORS (default: unset, CORS off)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: stock_feed=info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stock_feed::application::services::{PriceCache, PriceResolver, UpdateScheduler};
use stock_feed::domain::pricing::PriceJitter;
use stock_feed::domain::registry::TickerRegistry;
use stock_feed::infrastructure::broadcast::{BroadcastChannel, BroadcastConfig};
use stock_feed::infrastructure::config::FeedConfig;
use stock_feed::infrastructure::http::{AppState, HttpServer};
use stock_feed::infrastructure::origin::AlphaVantageClient;
use stock_feed::infrastructure::persistence::SqlitePriceStore;
use stock_feed::infrastructure::telemetry;
use stock_feed::init_metrics;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting stock feed");

    init_metrics().context("failed to install Prometheus recorder")?;

    let config = FeedConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let store = Arc::new(
        SqlitePriceStore::connect(&config.store)
            .await
            .context("failed to open price store")?,
    );
    let origin = Arc::new(
        AlphaVantageClient::new(&config.origin).context("failed to build quote origin client")?,
    );

    let registry = Arc::new(TickerRegistry::new());
    let cache = Arc::new(PriceCache::new());
    let resolver = Arc::new(PriceResolver::new(
        store.clone(),
        origin,
        Arc::clone(&cache),
        registry,
    ));

    let broadcast = Arc::new(BroadcastChannel::new(BroadcastConfig::from(
        config.broadcast.clone(),
    )));

    let scheduler = Arc::new(UpdateScheduler::new(
        Arc::clone(&resolver),
        broadcast.clone(),
        PriceJitter::new(config.updates.max_percentage_change),
        config.updates.interval,
        shutdown_token.clone(),
    ));

    let state = Arc::new(AppState::new(
        Arc::clone(&resolver),
        Arc::clone(&broadcast),
        Arc::clone(&cache),
        Arc::clone(&scheduler),
        env!("CARGO_PKG_VERSION"),
    ));
    let http_server = HttpServer::new(config.server.http_port, state, shutdown_token.clone())
        .with_cors_origin(config.server.cors_allowed_origin.clone());

    // Spawn update scheduler
    let scheduler_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run().await }
    });

    // Spawn HTTP server; a failure here takes the whole service down
    let server_token = shutdown_token.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
            server_token.cancel();
        }
    });

    tracing::info!("Stock feed ready");

    tokio::select! {
        () = await_shutdown() => {}
        () = shutdown_token.cancelled() => {}
    }
    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = tokio::join!(scheduler_task, server_task);
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Shutdown timeout elapsed, exiting with tasks still running");
    }

    store.close().await;

    tracing::info!("Stock feed stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        database_url = %config.store.database_url,
        update_interval_ms = config.updates.interval.as_millis(),
        max_percentage_change = config.updates.max_percentage_change,
        "Configuration loaded"
    );
    tracing::debug!(
        origin_url = %config.origin.base_url,
        origin_timeout_secs = config.origin.timeout.as_secs(),
        connection_buffer = config.broadcast.connection_buffer,
        group_capacity = config.broadcast.group_capacity,
        max_groups_per_connection = config.broadcast.max_groups_per_connection,
        "Adapter settings"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
