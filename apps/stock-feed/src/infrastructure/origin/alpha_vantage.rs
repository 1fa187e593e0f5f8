//! Alpha Vantage quote origin.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::api_types::{IntradayResponse, SymbolSearchResponse};
use crate::application::ports::{OriginError, QuoteOrigin};
use crate::domain::pricing::{PricePoint, TickerMatch};
use crate::domain::ticker::Ticker;
use crate::infrastructure::config::{ApiKey, OriginSettings};
use crate::infrastructure::metrics::{self, OriginRequest};

/// Bar interval requested from the intraday endpoint.
const INTRADAY_INTERVAL: &str = "15min";

/// Alpha Vantage REST client.
///
/// The current price of a ticker is the high of its most recent 15 minute
/// bar.
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl AlphaVantageClient {
    /// Create a client from settings.
    pub fn new(settings: &OriginSettings) -> Result<Self, OriginError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| OriginError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        kind: OriginRequest,
        params: &[(&str, &str)],
    ) -> Result<T, OriginError> {
        metrics::record_origin_request(kind);

        let result = self.send(params).await;
        if let Err(e) = &result {
            metrics::record_origin_error(kind, error_type(e));
        }
        result
    }

    async fn send<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, OriginError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.expose())])
            .send()
            .await
            .map_err(|e| OriginError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| OriginError::Network(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| OriginError::Parse(e.to_string()))
    }
}

#[async_trait]
impl QuoteOrigin for AlphaVantageClient {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Option<PricePoint>, OriginError> {
        let response: IntradayResponse = self
            .query(
                OriginRequest::Quote,
                &[
                    ("function", "TIME_SERIES_INTRADAY"),
                    ("symbol", ticker.as_str()),
                    ("interval", INTRADAY_INTERVAL),
                ],
            )
            .await?;

        if let Some(message) = response.notice.rate_limit() {
            warn!(ticker = %ticker, message, "Quote origin rate limited");
            metrics::record_origin_error(OriginRequest::Quote, "rate_limited");
            return Err(OriginError::RateLimited(message.to_string()));
        }

        if let Some(message) = &response.notice.error_message {
            debug!(ticker = %ticker, message = %message, "Quote origin does not know ticker");
            return Ok(None);
        }

        let Some((bar_time, bar)) = response.latest_bar() else {
            debug!(ticker = %ticker, "Quote origin returned no bars");
            return Ok(None);
        };

        if bar.high.is_sign_negative() {
            return Err(OriginError::Parse(format!(
                "negative high {} for {ticker} at {bar_time}",
                bar.high
            )));
        }

        debug!(ticker = %ticker, bar_time = %bar_time, high = %bar.high, "Fetched quote");
        Ok(Some(PricePoint::new(ticker.clone(), bar.high)))
    }

    async fn search(&self, keywords: &str) -> Result<Vec<TickerMatch>, OriginError> {
        let response: SymbolSearchResponse = self
            .query(
                OriginRequest::Search,
                &[("function", "SYMBOL_SEARCH"), ("keywords", keywords)],
            )
            .await?;

        if let Some(message) = response.notice.rate_limit() {
            warn!(keywords, message, "Quote origin rate limited");
            metrics::record_origin_error(OriginRequest::Search, "rate_limited");
            return Err(OriginError::RateLimited(message.to_string()));
        }

        Ok(response
            .best_matches
            .into_iter()
            .map(|m| TickerMatch {
                symbol: m.symbol,
                display_name: m.name,
            })
            .collect())
    }
}

const fn error_type(e: &OriginError) -> &'static str {
    match e {
        OriginError::Network(_) => "network",
        OriginError::Status { .. } => "status",
        OriginError::RateLimited(_) => "rate_limited",
        OriginError::Parse(_) => "parse",
    }
}
