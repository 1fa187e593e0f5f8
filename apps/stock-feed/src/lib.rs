#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Stock Feed - Price Resolution and Live Update Service
//!
//! Resolves current stock prices from a local store or an external quote
//! origin, remembers which tickers have been requested, and pushes a
//! periodically recomputed price for each of them to subscribed clients.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types and shared state, no I/O
//!   - `ticker`: Normalized ticker symbols
//!   - `pricing`: Price points, updates and the random walk
//!   - `registry`: Active ticker set
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Price store, quote origin and update publisher interfaces
//!   - `services`: Origin cache, price resolver, update scheduler
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `persistence`: SQLite and in-memory price stores
//!   - `origin`: Alpha Vantage client
//!   - `broadcast`: Ticker groups and fan-out
//!   - `http`: REST API, WebSocket feed, health endpoints
//!   - `config`, `telemetry`, `metrics`
//!
//! # Data Flow
//!
//! ```text
//! GET /api/stocks/{t} ──► PriceResolver ──► PriceStore ──(miss)──► PriceCache ──► QuoteOrigin
//!                              │
//!                              └──► TickerRegistry ◄── UpdateScheduler (every interval)
//!                                                            │
//!                                                            ▼
//! WebSocket clients ◄──────────────────────────────── BroadcastChannel
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::pricing::{PriceJitter, PricePoint, PriceUpdate, TickerMatch};
pub use domain::registry::TickerRegistry;
pub use domain::ticker::{Ticker, TickerError};

// Ports and services
pub use application::ports::{
    OriginError, PriceStore, QuoteOrigin, StoreError, UpdatePublisher,
};
pub use application::services::{
    ORIGIN_CACHE_TTL, PriceCache, PriceResolver, ResolveError, SchedulerState, TickReport,
    UpdateScheduler,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FeedConfig};

// Broadcast channel
pub use infrastructure::broadcast::{
    BroadcastChannel, BroadcastConfig, BroadcastError, BroadcastStats, ConnectionId,
};

// Adapters
pub use infrastructure::origin::AlphaVantageClient;
pub use infrastructure::persistence::{InMemoryPriceStore, SqlitePriceStore};

// HTTP server
pub use infrastructure::http::{AppState, HttpServer, HttpServerError, cors_layer, router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
