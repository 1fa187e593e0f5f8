//! Service-level metric recording.
//!
//! Calls go straight to the `metrics` facade; whichever recorder the binary
//! installs picks them up. Names are described by
//! `infrastructure::metrics::init_metrics`.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::application::services::TickReport;

/// Metric labels for resolution outcomes.
#[derive(Debug, Clone, Copy)]
pub enum ResolutionOutcome {
    /// Served from the price store.
    Store,
    /// Served from the quote origin.
    Origin,
    /// No source had a price.
    NotFound,
    /// A source failed.
    Failed,
}

impl ResolutionOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Origin => "origin",
            Self::NotFound => "not_found",
            Self::Failed => "failed",
        }
    }
}

/// Record the outcome of a price resolution.
pub fn record_resolution(outcome: ResolutionOutcome) {
    counter!("stock_feed_resolutions_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record an origin cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("stock_feed_cache_lookups_total", "result" => result).increment(1);
}

/// Record a row appended to the price store.
pub fn record_store_write() {
    counter!("stock_feed_store_writes_total").increment(1);
}

/// Record a finished scheduler tick.
pub fn record_tick(duration: Duration, report: &TickReport) {
    counter!("stock_feed_ticks_total").increment(1);
    histogram!("stock_feed_tick_duration_seconds").record(duration.as_secs_f64());
    if report.failed > 0 {
        counter!("stock_feed_tick_failures_total").increment(report.failed as u64);
    }
}

/// Record one published update and how many members received it.
pub fn record_update_published(delivered: usize) {
    counter!("stock_feed_updates_published_total").increment(1);
    counter!("stock_feed_deliveries_total").increment(delivered as u64);
}

/// Update the active ticker count.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_tickers(count: usize) {
    gauge!("stock_feed_active_tickers").set(count as f64);
}
