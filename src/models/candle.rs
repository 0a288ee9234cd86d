//! OHLCV candle data as returned by the market-data provider.

use serde::{Deserialize, Serialize};

/// One closed (or still-open latest) measurement period for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Period start, milliseconds since the Unix epoch. Serves as the
    /// period identifier for duplicate suppression.
    pub open_time: i64,
    /// Opening price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Closing (or latest) price.
    pub close: f64,
    /// Quote-asset volume traded within the period.
    pub volume: f64,
    /// Number of trades within the period.
    pub trades: u64,
}
