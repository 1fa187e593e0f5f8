//! Price Store Adapters
//!
//! - `SqlitePriceStore`: sqlx pool over SQLite, the production store
//! - `InMemoryPriceStore`: process-local store for tests and development

mod in_memory;
mod schema;
mod sqlite;

pub use in_memory::InMemoryPriceStore;
pub use schema::initialize_schema;
pub use sqlite::SqlitePriceStore;
