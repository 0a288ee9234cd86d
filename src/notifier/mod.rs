//! Notification sinks and message rendering.

pub mod error;
mod message;
mod telegram;

use async_trait::async_trait;
pub use error::NotificationError;
pub use message::format_alert;
#[cfg(test)]
use mockall::automock;
pub use telegram::TelegramNotifier;

/// A sink that can deliver rendered alert text to its configured
/// destination. The dispatcher treats delivery failures as transient and
/// retries without dropping the payload.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers one message. Must only return `Ok` once the transport has
    /// accepted it.
    async fn deliver(&self, text: &str) -> Result<(), NotificationError>;
}
