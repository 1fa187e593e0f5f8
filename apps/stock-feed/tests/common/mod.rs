//! Shared test doubles and wiring.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use stock_feed::{
    AppState, BroadcastChannel, BroadcastConfig, OriginError, PriceCache, PriceJitter,
    PricePoint, PriceResolver, PriceStore, QuoteOrigin, StoreError, Ticker, TickerMatch,
    TickerRegistry, UpdateScheduler,
};
use tokio_util::sync::CancellationToken;

/// Origin answering from a fixed table and counting calls.
#[derive(Default)]
pub struct StaticOrigin {
    prices: Mutex<HashMap<Ticker, Decimal>>,
    failing: Mutex<Option<OriginError>>,
    matches: Vec<TickerMatch>,
    pub quote_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl StaticOrigin {
    pub fn with_prices(prices: &[(&str, Decimal)]) -> Self {
        Self {
            prices: Mutex::new(
                prices
                    .iter()
                    .map(|(symbol, price)| (Ticker::new(symbol), *price))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn with_matches(matches: Vec<TickerMatch>) -> Self {
        Self {
            matches,
            ..Self::default()
        }
    }

    pub fn fail_with(&self, error: OriginError) {
        *self.failing.lock() = Some(error);
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteOrigin for StaticOrigin {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Option<PricePoint>, OriginError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failing.lock().clone() {
            return Err(error);
        }
        Ok(self
            .prices
            .lock()
            .get(ticker)
            .map(|price| PricePoint::new(ticker.clone(), *price)))
    }

    async fn search(&self, _keywords: &str) -> Result<Vec<TickerMatch>, OriginError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failing.lock().clone() {
            return Err(error);
        }
        Ok(self.matches.clone())
    }
}

/// Origin that never answers.
pub struct StalledOrigin;

#[async_trait]
impl QuoteOrigin for StalledOrigin {
    async fn fetch_quote(&self, _ticker: &Ticker) -> Result<Option<PricePoint>, OriginError> {
        std::future::pending().await
    }

    async fn search(&self, _keywords: &str) -> Result<Vec<TickerMatch>, OriginError> {
        std::future::pending().await
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl PriceStore for FailingStore {
    async fn latest(&self, _ticker: &Ticker) -> Result<Option<PricePoint>, StoreError> {
        Err(StoreError::Connection("database unreachable".into()))
    }

    async fn append(&self, _point: &PricePoint) -> Result<(), StoreError> {
        Err(StoreError::Connection("database unreachable".into()))
    }
}

pub fn resolver(store: Arc<dyn PriceStore>, origin: Arc<dyn QuoteOrigin>) -> Arc<PriceResolver> {
    Arc::new(PriceResolver::new(
        store,
        origin,
        Arc::new(PriceCache::new()),
        Arc::new(TickerRegistry::new()),
    ))
}

/// Fully wired service pieces around the given adapters.
pub struct Harness {
    pub resolver: Arc<PriceResolver>,
    pub broadcast: Arc<BroadcastChannel>,
    pub cache: Arc<PriceCache>,
    pub scheduler: Arc<UpdateScheduler>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(store: Arc<dyn PriceStore>, origin: Arc<dyn QuoteOrigin>) -> Self {
        let cache = Arc::new(PriceCache::new());
        let resolver = Arc::new(PriceResolver::new(
            store,
            origin,
            Arc::clone(&cache),
            Arc::new(TickerRegistry::new()),
        ));
        let broadcast = Arc::new(BroadcastChannel::new(BroadcastConfig::default()));
        let cancel = CancellationToken::new();
        let scheduler = Arc::new(UpdateScheduler::new(
            Arc::clone(&resolver),
            broadcast.clone(),
            PriceJitter::seeded(0.0, 1),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        Self {
            resolver,
            broadcast,
            cache,
            scheduler,
            cancel,
        }
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.broadcast),
            Arc::clone(&self.cache),
            Arc::clone(&self.scheduler),
            "test",
        ))
    }
}
