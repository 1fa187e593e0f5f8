//! Health Check and Metrics Endpoints
//!
//! Used by container orchestrators, load balancers, and monitoring systems.
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness check (simple OK)
//! - `GET /readyz` - Readiness check (scheduler running)
//! - `GET /metrics` - Prometheus metrics in text format

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::application::services::{SchedulerState, TickReport};
use crate::infrastructure::broadcast::BroadcastStats;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Update scheduler state.
    pub scheduler: SchedulerState,
    /// Tickers being recomputed.
    pub active_tickers: usize,
    /// Origin cache entries.
    pub cached_quotes: usize,
    /// Connection and group counts.
    pub broadcast: BroadcastStats,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Updates flowing but some tickers failed on the last tick.
    Degraded,
    /// Scheduler stopped.
    Unhealthy,
}

// =============================================================================
// HTTP Handlers
// =============================================================================

pub(super) async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.scheduler.state() == SchedulerState::Stopped {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    } else {
        (StatusCode::OK, "READY")
    }
}

pub(super) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let scheduler = state.scheduler.state();

    HealthResponse {
        status: determine_health_status(scheduler, state.scheduler.last_report()),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        scheduler,
        active_tickers: state.resolver.registry().len(),
        cached_quotes: state.cache.len(),
        broadcast: state.broadcast.stats(),
    }
}

fn determine_health_status(scheduler: SchedulerState, last: Option<TickReport>) -> HealthStatus {
    match (scheduler, last) {
        (SchedulerState::Stopped, _) => HealthStatus::Unhealthy,
        (_, Some(report)) if report.failed > 0 => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}

// =============================================================================
// Tests
// =============================================================================
