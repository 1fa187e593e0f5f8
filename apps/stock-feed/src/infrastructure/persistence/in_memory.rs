//! In-memory price store for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{PriceStore, StoreError};
use crate::domain::pricing::PricePoint;
use crate::domain::ticker::Ticker;

/// In-memory implementation of `PriceStore`.
///
/// Suitable for testing and development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryPriceStore {
    rows: RwLock<Vec<PricePoint>>,
    writes: AtomicUsize,
}

impl InMemoryPriceStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `append` calls that succeeded.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// All rows recorded for a ticker, oldest first.
    #[must_use]
    pub fn rows_for(&self, ticker: &Ticker) -> Vec<PricePoint> {
        self.rows
            .read()
            .iter()
            .filter(|row| &row.ticker == ticker)
            .cloned()
            .collect()
    }

    /// Total number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn latest(&self, ticker: &Ticker) -> Result<Option<PricePoint>, StoreError> {
        let rows = self.rows.read();
        // Later rows win ties on timestamp, matching insertion order
        Ok(rows
            .iter()
            .enumerate()
            .filter(|(_, row)| &row.ticker == ticker)
            .max_by_key(|(index, row)| (row.observed_at, *index))
            .map(|(_, row)| row.clone()))
    }

    async fn append(&self, point: &PricePoint) -> Result<(), StoreError> {
        self.rows.write().push(point.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
