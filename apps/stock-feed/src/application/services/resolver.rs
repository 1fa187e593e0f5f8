//! Price Resolution
//!
//! Answers "what is the current price of this ticker" with a fixed order of
//! sources:
//!
//! 1. Latest row in the price store
//! 2. Quote origin, memoized by [`PriceCache`], with the result written
//!    through to the store
//! 3. Absence
//!
//! Every successful resolution registers the ticker as active so the update
//! scheduler starts recomputing it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::application::metrics::{self, ResolutionOutcome};
use crate::application::ports::{OriginError, PriceStore, QuoteOrigin, StoreError};
use crate::application::services::cache::{ORIGIN_CACHE_TTL, PriceCache};
use crate::domain::pricing::{PricePoint, TickerMatch};
use crate::domain::registry::TickerRegistry;
use crate::domain::ticker::Ticker;

/// Resolution failure. Absence is not a failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// Price store read or write-through failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Quote origin failed.
    #[error(transparent)]
    Origin(#[from] OriginError),
}

/// Resolves current prices and keeps the active ticker registry up to date.
pub struct PriceResolver {
    store: Arc<dyn PriceStore>,
    origin: Arc<dyn QuoteOrigin>,
    cache: Arc<PriceCache>,
    registry: Arc<TickerRegistry>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for PriceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceResolver")
            .field("cached", &self.cache.len())
            .field("active_tickers", &self.registry.len())
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl PriceResolver {
    /// Create a resolver using the default origin cache TTL.
    #[must_use]
    pub fn new(
        store: Arc<dyn PriceStore>,
        origin: Arc<dyn QuoteOrigin>,
        cache: Arc<PriceCache>,
        registry: Arc<TickerRegistry>,
    ) -> Self {
        Self {
            store,
            origin,
            cache,
            registry,
            cache_ttl: ORIGIN_CACHE_TTL,
        }
    }

    /// Override the origin cache TTL.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Registry this resolver registers tickers in.
    #[must_use]
    pub fn registry(&self) -> &Arc<TickerRegistry> {
        &self.registry
    }

    /// Resolve the current price of `ticker`.
    ///
    /// Returns `Ok(None)` when neither the store nor the origin has a price.
    /// A failed write-through fails the whole resolution and leaves the ticker
    /// unregistered.
    pub async fn resolve(&self, ticker: &Ticker) -> Result<Option<PricePoint>, ResolveError> {
        let resolved = self.resolve_from_sources(ticker).await;

        match &resolved {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(ticker = %ticker, "No price data available");
                metrics::record_resolution(ResolutionOutcome::NotFound);
            }
            Err(e) => {
                error!(ticker = %ticker, error = %e, "Error resolving stock price");
                metrics::record_resolution(ResolutionOutcome::Failed);
            }
        }

        resolved
    }

    async fn resolve_from_sources(
        &self,
        ticker: &Ticker,
    ) -> Result<Option<PricePoint>, ResolveError> {
        if let Some(point) = self.store.latest(ticker).await? {
            debug!(ticker = %ticker, price = %point.price, "Resolved from store");
            self.activate(ticker);
            metrics::record_resolution(ResolutionOutcome::Store);
            return Ok(Some(point));
        }

        // Cached at store precision so later store hits return the same point
        let fetched = self
            .cache
            .get_or_compute(ticker, self.cache_ttl, || async {
                let quote = self.origin.fetch_quote(ticker).await?;
                Ok::<_, OriginError>(quote.map(PricePoint::at_stored_precision))
            })
            .await?;

        let Some(point) = fetched else {
            return Ok(None);
        };

        self.store.append(&point).await?;
        metrics::record_store_write();

        info!(ticker = %ticker, price = %point.price, "Resolved from quote origin");
        self.activate(ticker);
        metrics::record_resolution(ResolutionOutcome::Origin);

        Ok(Some(point))
    }

    fn activate(&self, ticker: &Ticker) {
        if self.registry.add(ticker) {
            info!(ticker = %ticker, "Ticker activated");
            metrics::set_active_tickers(self.registry.len());
        }
    }

    /// Search tickers by name fragment. Results are not cached.
    pub async fn search(&self, keywords: &str) -> Result<Vec<TickerMatch>, ResolveError> {
        match self.origin.search(keywords).await {
            Ok(matches) => {
                debug!(keywords, matches = matches.len(), "Ticker search completed");
                Ok(matches)
            }
            Err(e) => {
                error!(keywords, error = %e, "Error searching tickers");
                Err(e.into())
            }
        }
    }
}
