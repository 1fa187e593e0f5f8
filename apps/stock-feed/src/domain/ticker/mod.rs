//! Ticker value object.
//!
//! Tickers are compared case-insensitively: construction trims surrounding
//! whitespace and upper-cases the symbol, so "aapl" and " AAPL " are the same
//! registry key, cache key, store row key and broadcast group.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum ticker length (width of the `ticker` column in the price store).
pub const MAX_TICKER_LEN: usize = 10;

/// A normalized stock ticker symbol.
///
/// Examples: "AAPL", "MSFT", "BRK.B"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Create a new ticker without validation.
    ///
    /// The symbol is trimmed and normalized to uppercase.
    #[must_use]
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_uppercase())
    }

    /// Parse and validate user-supplied input.
    pub fn parse(value: &str) -> Result<Self, TickerError> {
        let ticker = Self::new(value);
        ticker.validate()?;
        Ok(ticker)
    }

    /// Validate the symbol.
    pub fn validate(&self) -> Result<(), TickerError> {
        if self.0.is_empty() {
            return Err(TickerError::Empty);
        }

        if self.0.chars().count() > MAX_TICKER_LEN {
            return Err(TickerError::TooLong {
                len: self.0.chars().count(),
            });
        }

        if let Some(c) = self
            .0
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
        {
            return Err(TickerError::InvalidCharacter(c));
        }

        Ok(())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Ticker {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Ticker {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

/// Ticker validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerError {
    /// Input was empty after trimming.
    #[error("ticker cannot be empty")]
    Empty,

    /// Input exceeds the store column width.
    #[error("ticker is {len} characters long, maximum is {MAX_TICKER_LEN}")]
    TooLong {
        /// Actual length.
        len: usize,
    },

    /// Input contains a character outside `[A-Z0-9.-]`.
    #[error("ticker contains invalid character {0:?}")]
    InvalidCharacter(char),
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_case::test_case;

    use super::*;

    #[test_case("aapl", "AAPL" ; "lowercase")]
    #[test_case("  msft ", "MSFT" ; "surrounding whitespace")]
    #[test_case("brk.b", "BRK.B" ; "class share")]
    #[test_case("RDS-A", "RDS-A" ; "dash")]
    fn parse_normalizes(input: &str, expected: &str) {
        assert_eq!(Ticker::parse(input).unwrap().as_str(), expected);
    }

    #[test_case("" => TickerError::Empty ; "empty")]
    #[test_case("   " => TickerError::Empty ; "blank")]
    #[test_case("ABCDEFGHIJK" => TickerError::TooLong { len: 11 } ; "too long")]
    #[test_case("AA PL" => TickerError::InvalidCharacter(' ') ; "inner space")]
    #[test_case("AAPL!" => TickerError::InvalidCharacter('!') ; "punctuation")]
    fn parse_rejects(input: &str) -> TickerError {
        Ticker::parse(input).unwrap_err()
    }

    #[test]
    fn identity_is_case_insensitive() {
        let mut set = HashSet::new();
        set.insert(Ticker::new("AAPL"));
        set.insert(Ticker::new("aapl"));
        set.insert(Ticker::new("MSFT"));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serde_normalizes_on_deserialize() {
        let ticker: Ticker = serde_json::from_str("\"ibm\"").unwrap();
        assert_eq!(ticker, Ticker::new("IBM"));
        assert_eq!(serde_json::to_string(&ticker).unwrap(), "\"IBM\"");
    }
}
