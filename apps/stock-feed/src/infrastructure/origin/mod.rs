//! Quote Origin Adapters
//!
//! Alpha Vantage REST client implementing `QuoteOrigin`.

mod alpha_vantage;
mod api_types;

pub use alpha_vantage::AlphaVantageClient;
