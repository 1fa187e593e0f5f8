//! Price query and ticker search handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::application::services::ResolveError;
use crate::domain::pricing::{PricePoint, TickerMatch};
use crate::domain::ticker::{Ticker, TickerError};

/// Longest accepted search fragment.
const MAX_SEARCH_LEN: usize = 64;

/// Body of a successful price query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResponse {
    /// Normalized ticker.
    pub ticker: Ticker,
    /// Latest known price.
    pub price: Decimal,
}

impl From<PricePoint> for PriceResponse {
    fn from(point: PricePoint) -> Self {
        Self {
            ticker: point.ticker,
            price: point.price,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable reason.
    pub error: String,
}

#[derive(Debug)]
pub(super) enum ApiError {
    InvalidTicker(TickerError),
    InvalidSearch(&'static str),
    NotFound(Ticker),
    Upstream(ResolveError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::InvalidTicker(e) => (StatusCode::BAD_REQUEST, format!("invalid ticker: {e}")),
            Self::InvalidSearch(reason) => (StatusCode::BAD_REQUEST, reason.to_string()),
            Self::NotFound(ticker) => (
                StatusCode::NOT_FOUND,
                format!("No stock data available for ticker: {ticker}"),
            ),
            // Details are logged by the resolver
            Self::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "price source unavailable".to_string(),
            ),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

pub(super) async fn get_latest_price(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<PriceResponse>, ApiError> {
    let ticker = Ticker::parse(&ticker).map_err(ApiError::InvalidTicker)?;

    match state.resolver.resolve(&ticker).await {
        Ok(Some(point)) => Ok(Json(point.into())),
        Ok(None) => Err(ApiError::NotFound(ticker)),
        Err(e) => Err(ApiError::Upstream(e)),
    }
}

pub(super) async fn search_tickers(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<TickerMatch>>, ApiError> {
    let keywords = name.trim();
    if keywords.is_empty() {
        return Err(ApiError::InvalidSearch("search text is empty"));
    }
    if keywords.chars().count() > MAX_SEARCH_LEN {
        return Err(ApiError::InvalidSearch("search text is too long"));
    }

    state
        .resolver
        .search(keywords)
        .await
        .map(Json)
        .map_err(ApiError::Upstream)
}
