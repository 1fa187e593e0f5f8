//! SQLite price store.
//!
//! Prices are stored as decimal text with 6 fractional digits and
//! timestamps as fixed-width RFC 3339 UTC text, so lexical order on the
//! `timestamp` column is chronological order.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info};

use super::schema;
use crate::application::ports::{PriceStore, StoreError};
use crate::domain::pricing::{PricePoint, STORED_PRICE_SCALE};
use crate::domain::ticker::Ticker;
use crate::infrastructure::config::StoreSettings;
use crate::infrastructure::metrics;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_) => Self::Connection(e.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

/// `PriceStore` backed by a SQLite connection pool.
///
/// The pool hands each query its own connection, so one store is shared by
/// every concurrent resolution.
#[derive(Debug, Clone)]
pub struct SqlitePriceStore {
    pool: SqlitePool,
}

impl SqlitePriceStore {
    /// Connect, creating the database file if needed, and initialize the schema.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        info!(database_url = %settings.database_url, "Connecting to price store");

        let options = SqliteConnectOptions::from_str(&settings.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self::with_pool(pool);
        store.initialize().await?;

        info!("Price store initialized");
        Ok(store)
    }

    /// In-memory database on a single long-lived connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // Every connection to `:memory:` is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self::with_pool(pool);
        store.initialize().await?;
        Ok(store)
    }

    /// Wrap an existing pool. The schema is not touched.
    #[must_use]
    pub const fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        schema::initialize_schema(&self.pool).await?;
        Ok(())
    }

    /// Check that a connection can be acquired and used.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Number of rows recorded for a ticker.
    pub async fn count_for(&self, ticker: &Ticker) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stock_prices WHERE ticker = ?")
            .bind(ticker.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn latest(&self, ticker: &Ticker) -> Result<Option<PricePoint>, StoreError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            r"
            SELECT ticker, price, timestamp
            FROM stock_prices
            WHERE ticker = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(ticker.as_str())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|_| metrics::record_store_error("latest"))?;

        row.map(|(ticker, price, timestamp)| decode_row(ticker, &price, &timestamp))
            .transpose()
    }

    async fn append(&self, point: &PricePoint) -> Result<(), StoreError> {
        let price = point.price.round_dp(STORED_PRICE_SCALE).to_string();

        sqlx::query("INSERT INTO stock_prices (ticker, price, timestamp) VALUES (?, ?, ?)")
            .bind(point.ticker.as_str())
            .bind(&price)
            .bind(encode_timestamp(point.observed_at))
            .execute(&self.pool)
            .await
            .inspect_err(|_| metrics::record_store_error("append"))?;

        debug!(ticker = %point.ticker, price = %price, "Price row appended");
        Ok(())
    }
}

fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_row(ticker: String, price: &str, timestamp: &str) -> Result<PricePoint, StoreError> {
    let corrupt = |message: String| StoreError::Corrupt {
        ticker: ticker.clone(),
        message,
    };

    let price = Decimal::from_str(price).map_err(|e| corrupt(format!("price {price:?}: {e}")))?;
    let observed_at = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| corrupt(format!("timestamp {timestamp:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(PricePoint::at(Ticker::new(ticker), price, observed_at))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn timestamps_are_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let encoded = encode_timestamp(whole);

        assert_eq!(encoded, "2024-01-02T03:04:05.000000Z");
        assert_eq!(
            encoded.len(),
            encode_timestamp(whole + chrono::Duration::microseconds(123_456)).len()
        );
    }

    #[test]
    fn decode_rejects_garbage_price() {
        let result = decode_row("ABC".into(), "ten", "2024-01-02T03:04:05.000000Z");
        assert!(matches!(result, Err(StoreError::Corrupt { ticker, .. }) if ticker == "ABC"));
    }

    #[test]
    fn decode_round_trips_row() {
        let point = decode_row("ABC".into(), "101.230000", "2024-01-02T03:04:05.000000Z").unwrap();

        assert_eq!(point.ticker, Ticker::new("ABC"));
        assert_eq!(point.price, dec!(101.23));
        assert_eq!(point.observed_at, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    }
}
