//! Domain Layer - Core price types and shared state.
//!
//! This layer contains the ticker and price types and the active ticker
//! registry. Nothing here performs I/O.

/// Ticker value object.
pub mod ticker;

/// Price points, updates, search results and the random walk.
pub mod pricing;

/// Active ticker registry.
pub mod registry;
