//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Metric recording for the services.
pub mod metrics;

/// Port interfaces for external systems (price store, quote origin).
pub mod ports;

/// Price resolution and update scheduling services.
pub mod services;
