//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Resolution**: Outcomes of price resolution and cache lookups
//! - **Dependencies**: Price store writes and quote origin failures
//! - **Updates**: Scheduler ticks, published updates, group deliveries
//! - **State**: Active tickers and open feed connections
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port. Recording
//! before [`init_metrics`] is a no-op. Service-level recorders live in
//! `application::metrics`; this module records adapter events.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Resolution counters
    describe_counter!(
        "stock_feed_resolutions_total",
        "Price resolutions by outcome"
    );
    describe_counter!(
        "stock_feed_cache_lookups_total",
        "Origin cache lookups by result"
    );

    // Dependency counters
    describe_counter!(
        "stock_feed_store_writes_total",
        "Price rows appended to the store"
    );
    describe_counter!(
        "stock_feed_store_errors_total",
        "Price store failures by operation"
    );
    describe_counter!(
        "stock_feed_origin_requests_total",
        "Requests sent to the quote origin by kind"
    );
    describe_counter!(
        "stock_feed_origin_errors_total",
        "Quote origin failures by kind"
    );

    // Update counters
    describe_counter!("stock_feed_ticks_total", "Completed scheduler ticks");
    describe_counter!(
        "stock_feed_tick_failures_total",
        "Tickers skipped because their resolution failed"
    );
    describe_counter!(
        "stock_feed_updates_published_total",
        "Price updates published to groups"
    );
    describe_counter!(
        "stock_feed_deliveries_total",
        "Price updates handed to group members"
    );
    describe_counter!(
        "stock_feed_deliveries_dropped_total",
        "Price updates dropped for lagging members"
    );

    // State gauges
    describe_gauge!("stock_feed_active_tickers", "Tickers in the active registry");
    describe_gauge!("stock_feed_connections", "Open feed connections");

    // Latency histograms
    describe_histogram!(
        "stock_feed_tick_duration_seconds",
        "Time to process every active ticker once"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for quote origin request kinds.
#[derive(Debug, Clone, Copy)]
pub enum OriginRequest {
    /// Intraday quote lookup.
    Quote,
    /// Symbol search.
    Search,
}

impl OriginRequest {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Search => "search",
        }
    }
}

/// Record a price store failure.
pub fn record_store_error(operation: &'static str) {
    counter!("stock_feed_store_errors_total", "operation" => operation).increment(1);
}

/// Record a request sent to the quote origin.
pub fn record_origin_request(kind: OriginRequest) {
    counter!("stock_feed_origin_requests_total", "kind" => kind.as_str()).increment(1);
}

/// Record a quote origin failure.
pub fn record_origin_error(kind: OriginRequest, error_type: &'static str) {
    counter!(
        "stock_feed_origin_errors_total",
        "kind" => kind.as_str(),
        "error_type" => error_type
    )
    .increment(1);
}

/// Record updates dropped for a lagging group member.
pub fn record_deliveries_dropped(count: u64) {
    counter!("stock_feed_deliveries_dropped_total").increment(count);
}

/// Update the open connection count.
#[allow(clippy::cast_precision_loss)]
pub fn set_connections(count: usize) {
    gauge!("stock_feed_connections").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_request_as_str() {
        assert_eq!(OriginRequest::Quote.as_str(), "quote");
        assert_eq!(OriginRequest::Search.as_str(), "search");
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_origin_request(OriginRequest::Quote);
        record_deliveries_dropped(3);
        set_connections(2);
    }
}
