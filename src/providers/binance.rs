//! Binance REST market-data source.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use url::Url;

use super::traits::{MarketDataError, MarketDataSource};
use crate::models::{Candle, Timeframe};

/// Path of the klines (candlestick) endpoint.
const KLINES_ENDPOINT: &str = "/api/v3/klines";

/// Fetches OHLCV candles from the Binance public API.
pub struct BinanceDataSource {
    /// Base URL of the REST API.
    base_url: Url,
    /// Configured HTTP client with retry capabilities.
    client: Arc<ClientWithMiddleware>,
}

impl BinanceDataSource {
    /// Creates a new data source against the given API base URL.
    pub fn new(base_url: Url, client: Arc<ClientWithMiddleware>) -> Self {
        Self { base_url, client }
    }

    /// Fetches raw klines for a symbol and exchange interval.
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Vec<Value>>, MarketDataError> {
        let mut url = self.base_url.clone();
        url.set_path(KLINES_ENDPOINT);

        let response = self
            .client
            .get(url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", &limit.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Status(status.as_u16()));
        }

        Ok(response.json::<Vec<Vec<Value>>>().await?)
    }
}

/// Parses one Binance kline row into a structured candle.
///
/// Row layout: `[open_time, open, high, low, close, base_volume, close_time,
/// quote_volume, trades, ...]` with prices and volumes as strings. The quote
/// asset volume (index 7) is what the detector compares.
fn parse_candle(kline: &[Value]) -> Result<Candle, MarketDataError> {
    fn field_i64(kline: &[Value], index: usize) -> Result<i64, MarketDataError> {
        kline
            .get(index)
            .and_then(Value::as_i64)
            .ok_or_else(|| MarketDataError::Malformed(format!("field {index} is not an integer")))
    }

    fn field_f64(kline: &[Value], index: usize) -> Result<f64, MarketDataError> {
        let value = kline
            .get(index)
            .ok_or_else(|| MarketDataError::Malformed(format!("missing field {index}")))?;
        match value {
            Value::String(s) => s
                .parse::<f64>()
                .map_err(|_| MarketDataError::Malformed(format!("field {index}: '{s}'"))),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| MarketDataError::Malformed(format!("field {index} out of range"))),
            _ => Err(MarketDataError::Malformed(format!("field {index} has unexpected type"))),
        }
    }

    Ok(Candle {
        open_time: field_i64(kline, 0)?,
        open: field_f64(kline, 1)?,
        high: field_f64(kline, 2)?,
        low: field_f64(kline, 3)?,
        close: field_f64(kline, 4)?,
        volume: field_f64(kline, 7)?,
        trades: field_i64(kline, 8)? as u64,
    })
}

#[async_trait]
impl MarketDataSource for BinanceDataSource {
    async fn latest_pair(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(Candle, Candle)>, MarketDataError> {
        let interval = timeframe.source_interval();
        let klines = self.fetch_klines(symbol, interval, 2).await?;

        if klines.len() < 2 {
            tracing::warn!(symbol, %timeframe, "Insufficient candle data from provider.");
            return Ok(None);
        }

        // Binance returns candles in ascending order (oldest first).
        let previous = parse_candle(&klines[0])?;
        let current = parse_candle(&klines[1])?;

        Ok(Some((current, previous)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_kline() -> Vec<Value> {
        json!([
            1700000000000i64,
            "37000.10",
            "37500.00",
            "36800.00",
            "37250.55",
            "120.5",
            1700003599999i64,
            "4471234.56",
            9876,
            "60.2",
            "2231234.00",
            "0"
        ])
        .as_array()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_parse_candle() {
        let candle = parse_candle(&sample_kline()).unwrap();
        assert_eq!(candle.open_time, 1_700_000_000_000);
        assert_eq!(candle.open, 37000.10);
        assert_eq!(candle.close, 37250.55);
        // Quote asset volume, not base volume.
        assert_eq!(candle.volume, 4_471_234.56);
        assert_eq!(candle.trades, 9876);
    }

    #[test]
    fn test_parse_candle_rejects_short_row() {
        let row = json!([1700000000000i64, "1.0"]).as_array().unwrap().clone();
        let result = parse_candle(&row);
        assert!(matches!(result, Err(MarketDataError::Malformed(_))));
    }

    #[test]
    fn test_parse_candle_rejects_bad_number() {
        let mut row = sample_kline();
        row[7] = json!("not-a-number");
        let result = parse_candle(&row);
        assert!(matches!(result, Err(MarketDataError::Malformed(_))));
    }
}
