#![warn(missing_docs)]
//! volwatch is a market volume monitor that watches Binance trading pairs and
//! posts Telegram alerts when quote volume spikes, with persisted admission
//! control to keep the alert stream deduplicated and rate-limited.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod http_client;
pub mod models;
pub mod notifier;
pub mod persistence;
pub mod providers;
pub mod supervisor;
