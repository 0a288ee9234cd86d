//! Error types for the notification layer.

use thiserror::Error;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The notifier configuration is invalid.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// The HTTP request failed after exhausting middleware retries.
    #[error("Request error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The response body could not be read.
    #[error("Response error: {0}")]
    Response(#[from] reqwest::Error),

    /// The transport rejected the message.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),
}
