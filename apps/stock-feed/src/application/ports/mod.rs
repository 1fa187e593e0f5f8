//! Port Interfaces
//!
//! Contracts the application services depend on. Infrastructure adapters
//! implement them.
//!
//! ## Driven Ports (Outbound)
//!
//! - `PriceStore`: Append-only record of observed prices
//! - `QuoteOrigin`: External quote and symbol search provider
//! - `UpdatePublisher`: Fan-out of recomputed prices to subscribers

use async_trait::async_trait;

use crate::domain::pricing::{PricePoint, PriceUpdate, TickerMatch};
use crate::domain::ticker::Ticker;

// =============================================================================
// Price Store
// =============================================================================

/// Price store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Could not reach the database.
    #[error("price store connection error: {0}")]
    Connection(String),

    /// A query failed.
    #[error("price store query error: {0}")]
    Query(String),

    /// A stored row could not be decoded.
    #[error("corrupt price row for {ticker}: {message}")]
    Corrupt {
        /// Ticker of the row.
        ticker: String,
        /// Decoding failure.
        message: String,
    },
}

/// Durable, append-only record of observed prices.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Most recent price recorded for a ticker, if any.
    async fn latest(&self, ticker: &Ticker) -> Result<Option<PricePoint>, StoreError>;

    /// Append an observed price. Completes only once the row is durable.
    async fn append(&self, point: &PricePoint) -> Result<(), StoreError>;
}

// =============================================================================
// Quote Origin
// =============================================================================

/// Quote origin error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OriginError {
    /// Request could not be sent or the response body could not be read.
    #[error("quote origin network error: {0}")]
    Network(String),

    /// Origin answered with a non-success status.
    #[error("quote origin returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Origin refused the request because of its call quota.
    #[error("quote origin rate limited: {0}")]
    RateLimited(String),

    /// Response body was not in the expected shape.
    #[error("quote origin response could not be parsed: {0}")]
    Parse(String),
}

/// External source of current prices and symbol search.
#[async_trait]
pub trait QuoteOrigin: Send + Sync {
    /// Fetch the current price for a ticker.
    ///
    /// Returns `Ok(None)` when the origin does not know the ticker.
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Option<PricePoint>, OriginError>;

    /// Search tickers by name fragment, best match first.
    async fn search(&self, keywords: &str) -> Result<Vec<TickerMatch>, OriginError>;
}

// =============================================================================
// Update Publisher
// =============================================================================

/// Best-effort delivery of price updates to everyone watching a ticker.
pub trait UpdatePublisher: Send + Sync {
    /// Publish an update to the group of `ticker`.
    ///
    /// Returns the number of members the update was handed to. A group with
    /// no members is not an error.
    fn publish(&self, ticker: &Ticker, update: PriceUpdate) -> usize;
}
