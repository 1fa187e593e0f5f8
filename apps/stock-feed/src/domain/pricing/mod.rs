//! Price Types
//!
//! Observed prices, pushed updates, search results, and the bounded random
//! walk used to derive the next published price from the last known one.

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ticker::Ticker;

/// Decimal places of a published price.
pub const PUBLISHED_PRICE_SCALE: u32 = 2;

/// Decimal places of a stored price.
pub const STORED_PRICE_SCALE: u32 = 6;

/// Fractional-second digits of a stored observation time.
const STORED_TIME_PRECISION: u16 = 6;

// =============================================================================
// Price Point
// =============================================================================

/// A price observed for a ticker at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Ticker the price belongs to.
    pub ticker: Ticker,
    /// Observed price.
    pub price: Decimal,
    /// When the price was observed.
    pub observed_at: DateTime<Utc>,
}

impl PricePoint {
    /// Create a price point observed now.
    #[must_use]
    pub fn new(ticker: Ticker, price: Decimal) -> Self {
        Self::at(ticker, price, Utc::now())
    }

    /// Create a price point with an explicit observation time.
    #[must_use]
    pub const fn at(ticker: Ticker, price: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            ticker,
            price,
            observed_at,
        }
    }

    /// The same point at the precision the price store keeps: price
    /// rounded to six places, time truncated to microseconds.
    #[must_use]
    pub fn at_stored_precision(self) -> Self {
        Self {
            price: self.price.round_dp(STORED_PRICE_SCALE),
            observed_at: self.observed_at.trunc_subsecs(STORED_TIME_PRECISION),
            ..self
        }
    }
}

// =============================================================================
// Price Update
// =============================================================================

/// Payload pushed to the subscribers of a ticker.
///
/// Carries no timestamp; receivers treat it as current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Ticker symbol.
    pub ticker: Ticker,
    /// New price.
    pub price: Decimal,
}

impl PriceUpdate {
    /// Create a new update.
    #[must_use]
    pub const fn new(ticker: Ticker, price: Decimal) -> Self {
        Self { ticker, price }
    }
}

impl From<&PricePoint> for PriceUpdate {
    fn from(point: &PricePoint) -> Self {
        Self::new(point.ticker.clone(), point.price)
    }
}

// =============================================================================
// Search Result
// =============================================================================

/// One ticker search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerMatch {
    /// Exchange symbol.
    pub symbol: String,
    /// Company or fund name.
    pub display_name: String,
}

// =============================================================================
// Random Walk
// =============================================================================

/// Apply a relative change to a price.
///
/// Returns `max(0, price + price * factor)` rounded to two decimal places
/// (banker's rounding).
#[must_use]
pub fn perturb_price(price: Decimal, factor: Decimal) -> Decimal {
    (price + price * factor)
        .max(Decimal::ZERO)
        .round_dp(PUBLISHED_PRICE_SCALE)
}

/// Source of uniformly distributed change factors in `[-max_pct, +max_pct]`.
pub struct PriceJitter {
    max_pct: f64,
    rng: Mutex<StdRng>,
}

impl PriceJitter {
    /// Jitter seeded from the operating system.
    #[must_use]
    pub fn new(max_pct: f64) -> Self {
        Self::with_rng(max_pct, StdRng::from_os_rng())
    }

    /// Deterministic jitter for tests and replays.
    #[must_use]
    pub fn seeded(max_pct: f64, seed: u64) -> Self {
        Self::with_rng(max_pct, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_pct: f64, rng: StdRng) -> Self {
        Self {
            max_pct: max_pct.abs(),
            rng: Mutex::new(rng),
        }
    }

    /// Configured bound.
    #[must_use]
    pub const fn max_pct(&self) -> f64 {
        self.max_pct
    }

    /// Draw the next change factor.
    pub fn next_factor(&self) -> Decimal {
        if self.max_pct == 0.0 {
            return Decimal::ZERO;
        }

        let factor = self
            .rng
            .lock()
            .random_range(-self.max_pct..=self.max_pct);

        Decimal::try_from(factor).unwrap_or(Decimal::ZERO)
    }

    /// Derive the next published price from the last known one.
    pub fn next_price(&self, price: Decimal) -> Decimal {
        perturb_price(price, self.next_factor())
    }
}

impl std::fmt::Debug for PriceJitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceJitter")
            .field("max_pct", &self.max_pct)
            .finish_non_exhaustive()
    }
}
