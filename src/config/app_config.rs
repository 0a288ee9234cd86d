use std::{collections::HashMap, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{deserialize_duration_from_seconds, HttpRetryConfig, TimeframePolicy};
use crate::models::Timeframe;

/// Provides the default value for poll_interval_secs.
fn default_poll_interval() -> Duration {
    Duration::from_secs(300)
}

/// Provides the default value for dispatch_spacing_secs.
fn default_dispatch_spacing() -> Duration {
    Duration::from_secs(600)
}

/// Provides the default value for shutdown_timeout_secs.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for alert_channel_capacity.
fn default_alert_channel_capacity() -> u32 {
    256
}

fn default_binance_api_url() -> Url {
    Url::parse("https://api.binance.com").expect("static URL is valid")
}

/// Telegram transport and operator-control settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramSettings {
    /// Bot token issued by BotFather.
    pub token: String,

    /// Destination chat for alerts.
    pub chat_id: String,

    /// Optional topic (message thread) inside the destination chat. When set,
    /// every alert is sub-addressed to this topic.
    #[serde(default)]
    pub topic_id: Option<i64>,

    /// Chat id of the operator allowed to issue /start and /stop.
    pub owner_chat_id: i64,

    /// Bot username. When set, group commands must mention it
    /// (e.g. `/stop @volwatch_bot`) to be honored.
    #[serde(default)]
    pub bot_username: Option<String>,

    /// Interval between getUpdates polls.
    #[serde(
        rename = "command_poll_interval_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_command_poll_interval"
    )]
    pub command_poll_interval: Duration,
}

fn default_command_poll_interval() -> Duration {
    Duration::from_secs(2)
}

/// Application configuration for volwatch.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Trading pairs to monitor.
    pub symbols: Vec<String>,

    /// Per-timeframe alerting policies. Every monitored timeframe must have
    /// an entry here.
    pub timeframes: HashMap<Timeframe, TimeframePolicy>,

    /// The interval between market-data polls.
    #[serde(
        rename = "poll_interval_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_poll_interval"
    )]
    pub poll_interval: Duration,

    /// Global minimum spacing between any two delivered alerts, independent
    /// of per-key cooldowns.
    #[serde(
        rename = "dispatch_spacing_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_dispatch_spacing"
    )]
    pub dispatch_spacing: Duration,

    /// Base URL of the Binance REST API.
    #[serde(default = "default_binance_api_url")]
    pub binance_api_url: Url,

    /// Telegram transport settings.
    pub telegram: TelegramSettings,

    /// Configuration for HTTP client retry policies.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,

    /// The maximum time to wait for graceful shutdown.
    #[serde(
        rename = "shutdown_timeout_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// The capacity of the channel feeding the alert dispatcher.
    #[serde(default = "default_alert_channel_capacity")]
    pub alert_channel_capacity: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            symbols: Vec::new(),
            timeframes: HashMap::new(),
            poll_interval: default_poll_interval(),
            dispatch_spacing: default_dispatch_spacing(),
            binance_api_url: default_binance_api_url(),
            telegram: TelegramSettings::default(),
            http_retry_config: HttpRetryConfig::default(),
            shutdown_timeout: default_shutdown_timeout(),
            alert_channel_capacity: default_alert_channel_capacity(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory,
    /// with `VOLWATCH__` environment overrides. Policy errors are fatal here,
    /// before any component starts.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("VOLWATCH").separator("__"))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the loaded configuration. Missing or malformed policy for a
    /// timeframe fails startup rather than being handled per candidate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Message("symbols must not be empty".into()));
        }
        if self.timeframes.is_empty() {
            return Err(ConfigError::Message(
                "at least one timeframe policy is required".into(),
            ));
        }
        for (timeframe, policy) in &self.timeframes {
            if policy.threshold_pct <= 0.0 {
                return Err(ConfigError::Message(format!(
                    "timeframe {timeframe}: threshold_pct must be positive"
                )));
            }
            if policy.max_per_period == 0 {
                return Err(ConfigError::Message(format!(
                    "timeframe {timeframe}: max_per_period must be at least 1"
                )));
            }
        }
        if self.telegram.token.is_empty() {
            return Err(ConfigError::Message("telegram.token must not be empty".into()));
        }
        if self.telegram.chat_id.is_empty() {
            return Err(ConfigError::Message("telegram.chat_id must not be empty".into()));
        }
        Ok(())
    }
}
