//! Active Ticker Registry
//!
//! Tracks the tickers that have been resolved successfully at least once
//! since process start. The update scheduler recomputes prices for exactly
//! this set.
//!
//! # Design
//!
//! - Membership is added by every successful resolution and never removed
//! - `all_tickers` copies the set under a short read lock, so it neither
//!   reflects later `add` calls nor holds writers off beyond the copy
//! - No ordering is guaranteed on the returned snapshot

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::domain::ticker::Ticker;

/// Thread-safe set of active tickers.
///
/// # Example
///
/// ```rust
/// use stock_feed::domain::registry::TickerRegistry;
/// use stock_feed::domain::ticker::Ticker;
///
/// let registry = TickerRegistry::new();
///
/// assert!(registry.add(&Ticker::new("AAPL")));
/// // Second add is a no-op
/// assert!(!registry.add(&Ticker::new("aapl")));
///
/// assert_eq!(registry.all_tickers(), vec![Ticker::new("AAPL")]);
/// ```
#[derive(Debug, Default)]
pub struct TickerRegistry {
    tickers: RwLock<HashSet<Ticker>>,
}

impl TickerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a ticker as active.
    ///
    /// Returns `true` if the ticker was not already present.
    pub fn add(&self, ticker: &Ticker) -> bool {
        // Fast path: most resolutions hit an already active ticker
        if self.tickers.read().contains(ticker) {
            return false;
        }

        self.tickers.write().insert(ticker.clone())
    }

    /// Snapshot of all active tickers.
    #[must_use]
    pub fn all_tickers(&self) -> Vec<Ticker> {
        self.tickers.read().iter().cloned().collect()
    }

    /// Check whether a ticker is active.
    #[must_use]
    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.tickers.read().contains(ticker)
    }

    /// Number of active tickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.read().len()
    }

    /// Whether no ticker is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn add_new_ticker() {
        let registry = TickerRegistry::new();

        assert!(registry.add(&Ticker::new("AAPL")));
        assert!(registry.contains(&Ticker::new("AAPL")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_is_idempotent() {
        let registry = TickerRegistry::new();

        registry.add(&Ticker::new("AAPL"));
        assert!(!registry.add(&Ticker::new("AAPL")));
        assert!(!registry.add(&Ticker::new("aapl")));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_registry_has_no_tickers() {
        let registry = TickerRegistry::new();

        assert!(registry.is_empty());
        assert!(registry.all_tickers().is_empty());
        assert!(!registry.contains(&Ticker::new("ZZZ")));
    }

    #[test]
    fn snapshot_is_detached_from_later_adds() {
        let registry = TickerRegistry::new();
        registry.add(&Ticker::new("AAPL"));

        let snapshot = registry.all_tickers();
        registry.add(&Ticker::new("MSFT"));

        assert_eq!(snapshot, vec![Ticker::new("AAPL")]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn thread_safety_concurrent_adds() {
        let registry = Arc::new(TickerRegistry::new());
        let mut handles = vec![];

        // 10 threads each add a unique ticker and a shared one
        for i in 0..10 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                r.add(&Ticker::new(format!("SYM{i}")));
                r.add(&Ticker::new("SHARED"));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // SYM0-SYM9 + SHARED
        assert_eq!(registry.len(), 11);
    }

    #[test]
    fn thread_safety_reads_during_writes() {
        let registry = Arc::new(TickerRegistry::new());

        let writer = {
            let r = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..500 {
                    r.add(&Ticker::new(format!("T{i}")));
                }
            })
        };

        let reader = {
            let r = Arc::clone(&registry);
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..500 {
                    let len = r.all_tickers().len();
                    assert!(len >= last);
                    last = len;
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(registry.len(), 500);
    }
}
