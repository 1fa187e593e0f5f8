//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `PriceCache`: TTL memoization of origin lookups
//! - `PriceResolver`: Store, then origin, then absence
//! - `UpdateScheduler`: Periodic recompute and publish loop

/// Origin lookup cache.
pub mod cache;

/// Price resolution.
pub mod resolver;

/// Periodic update loop.
pub mod scheduler;

pub use cache::{ORIGIN_CACHE_TTL, PriceCache};
pub use resolver::{PriceResolver, ResolveError};
pub use scheduler::{SchedulerState, TickReport, UpdateScheduler};
