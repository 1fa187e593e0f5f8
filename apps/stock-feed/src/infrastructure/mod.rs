//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus transport and observability.

/// Connection groups and price update fan-out.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// HTTP API, WebSocket feed and health endpoints.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Alpha Vantage quote origin client.
pub mod origin;

/// Price store adapters.
pub mod persistence;

/// Tracing and OpenTelemetry integration.
pub mod telemetry;
