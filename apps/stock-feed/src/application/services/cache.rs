//! Origin lookup cache.
//!
//! Time-based memoization of quote origin results so repeated misses in the
//! store do not hammer the external provider.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::domain::pricing::PricePoint;
use crate::domain::ticker::Ticker;
use crate::application::metrics;

/// Cache TTL for origin lookups (5 minutes).
pub const ORIGIN_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cached origin result.
#[derive(Debug, Clone)]
struct CacheEntry {
    point: PricePoint,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// TTL cache of origin price lookups keyed by ticker.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: RwLock<HashMap<Ticker, CacheEntry>>,
}

impl PriceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live entry for `ticker`, or run `compute` and cache its value.
    ///
    /// `compute` runs at most once per call and without any cache lock held.
    /// Only `Ok(Some(_))` results are stored; absence and errors leave the
    /// cache untouched so the next call retries.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        ticker: &Ticker,
        ttl: Duration,
        compute: F,
    ) -> Result<Option<PricePoint>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<PricePoint>, E>>,
    {
        if let Some(point) = self.get_live(ticker) {
            metrics::record_cache_lookup(true);
            return Ok(Some(point));
        }
        metrics::record_cache_lookup(false);

        let computed = compute().await?;

        if let Some(point) = &computed {
            self.entries.write().insert(
                ticker.clone(),
                CacheEntry {
                    point: point.clone(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }

        Ok(computed)
    }

    /// Live entry for a ticker, evicting it if it has expired.
    fn get_live(&self, ticker: &Ticker) -> Option<PricePoint> {
        let now = Instant::now();

        {
            let entries = self.entries.read();
            match entries.get(ticker) {
                None => return None,
                Some(entry) if entry.is_live(now) => return Some(entry.point.clone()),
                Some(_) => {}
            }
        }

        // A concurrent fetch may have refreshed the entry since the read
        let mut entries = self.entries.write();
        if entries.get(ticker).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(ticker);
        }

        None
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of cached entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
