//! Alpha Vantage response bodies.
//!
//! Throttled and rejected requests still answer HTTP 200; the reason is in
//! one of the `Note`, `Information` or `Error Message` fields.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Fields every response may carry instead of data.
#[derive(Debug, Default, Deserialize)]
pub struct ApiNotice {
    /// Request rejected, usually an unknown symbol.
    #[serde(rename = "Error Message")]
    pub error_message: Option<String>,
    /// Call frequency limit reached.
    #[serde(rename = "Note")]
    pub note: Option<String>,
    /// Daily quota reached or premium endpoint.
    #[serde(rename = "Information")]
    pub information: Option<String>,
}

impl ApiNotice {
    /// Rate limit message, if the request was throttled.
    pub fn rate_limit(&self) -> Option<&str> {
        self.note.as_deref().or(self.information.as_deref())
    }
}

/// `TIME_SERIES_INTRADAY` response.
#[derive(Debug, Deserialize)]
pub struct IntradayResponse {
    #[serde(flatten)]
    pub notice: ApiNotice,
    /// Bars keyed by `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "Time Series (15min)", default)]
    pub time_series: BTreeMap<String, IntradayBar>,
}

impl IntradayResponse {
    /// Most recent bar. Keys sort chronologically.
    pub fn latest_bar(&self) -> Option<(&String, &IntradayBar)> {
        self.time_series.last_key_value()
    }
}

/// One intraday bar. Only the high is used.
#[derive(Debug, Deserialize)]
pub struct IntradayBar {
    #[serde(rename = "2. high")]
    pub high: Decimal,
}

/// `SYMBOL_SEARCH` response.
#[derive(Debug, Deserialize)]
pub struct SymbolSearchResponse {
    #[serde(flatten)]
    pub notice: ApiNotice,
    #[serde(rename = "bestMatches", default)]
    pub best_matches: Vec<SymbolMatch>,
}

/// One search result.
#[derive(Debug, Deserialize)]
pub struct SymbolMatch {
    #[serde(rename = "1. symbol")]
    pub symbol: String,
    #[serde(rename = "2. name")]
    pub name: String,
}
