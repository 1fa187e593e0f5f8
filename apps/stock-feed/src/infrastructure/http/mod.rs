//! HTTP and WebSocket Transport
//!
//! One axum server carries the public API, the live feed and the
//! operational endpoints.
//!
//! # Endpoints
//!
//! - `GET /api/stocks/{ticker}` - Current price of a ticker
//! - `GET /api/stocks/search/{name}` - Ticker search by name fragment
//! - `GET /stocks-feed` - WebSocket feed of price updates
//! - `GET /health`, `/healthz`, `/readyz`, `/metrics` - Operational endpoints

mod api;
mod feed;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use api::{ErrorBody, PriceResponse};
pub use feed::{ClientMessage, ServerMessage};
pub use health::{HealthResponse, HealthStatus};

use crate::application::services::{PriceCache, PriceResolver, UpdateScheduler};
use crate::infrastructure::broadcast::BroadcastChannel;

// =============================================================================
// Shared State
// =============================================================================

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    resolver: Arc<PriceResolver>,
    broadcast: Arc<BroadcastChannel>,
    cache: Arc<PriceCache>,
    scheduler: Arc<UpdateScheduler>,
    version: String,
    started_at: Instant,
}

impl AppState {
    /// Create handler state.
    #[must_use]
    pub fn new(
        resolver: Arc<PriceResolver>,
        broadcast: Arc<BroadcastChannel>,
        cache: Arc<PriceCache>,
        scheduler: Arc<UpdateScheduler>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            broadcast,
            cache,
            scheduler,
            version: version.into(),
            started_at: Instant::now(),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/stocks/search/{name}", get(api::search_tickers))
        .route("/api/stocks/{ticker}", get(api::get_latest_price))
        .route("/stocks-feed", get(feed::feed_handler))
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy admitting one browser origin with credentials.
///
/// Requests from other origins get no CORS headers. Methods and headers
/// mirror the preflight request.
#[must_use]
pub fn cors_layer(allowed_origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list([allowed_origin]))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server for the API, feed and operational endpoints.
#[derive(Debug)]
pub struct HttpServer {
    port: u16,
    state: Arc<AppState>,
    cancel: CancellationToken,
    cors_origin: Option<HeaderValue>,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
            cors_origin: None,
        }
    }

    /// Allow cross-origin browser calls from `origin`.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: Option<HeaderValue>) -> Self {
        self.cors_origin = origin;
        self
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server encounters a
    /// fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let app = match self.cors_origin {
            Some(origin) => {
                tracing::info!(origin = ?origin, "CORS enabled");
                router(self.state).layer(cors_layer(origin))
            }
            None => router(self.state),
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
