//! Market-data providers.

pub mod binance;
pub mod traits;

pub use binance::BinanceDataSource;
