//! This module defines the interface for fetching market data.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::{Candle, Timeframe};

/// Custom error type for market-data source operations.
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// The HTTP request failed after exhausting retries.
    #[error("Request error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The response could not be read or decoded.
    #[error("Response error: {0}")]
    Response(#[from] reqwest::Error),

    /// The provider returned a non-success status code.
    #[error("Provider returned status {0}")]
    Status(u16),

    /// The provider returned data that does not match the expected shape.
    #[error("Malformed kline data: {0}")]
    Malformed(String),
}

/// A trait for a data source that can fetch candle data for monitored pairs.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches the latest (current, previous) candle pair for a symbol and
    /// timeframe. Returns `None` when the provider has insufficient history.
    ///
    /// The current candle's open time is the period identifier the admission
    /// controller deduplicates on; the provider is responsible for the
    /// closed-versus-open period boundary.
    async fn latest_pair(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(Candle, Candle)>, MarketDataError>;
}
