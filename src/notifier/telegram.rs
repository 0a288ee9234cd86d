//! Telegram message transport.

use std::sync::Arc;

use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use url::Url;

use super::error::NotificationError;
use crate::config::TelegramSettings;

/// Sends messages through the Telegram Bot API, optionally sub-addressed to
/// a topic (message thread) inside the destination chat.
pub struct TelegramNotifier {
    /// The sendMessage endpoint for this bot.
    send_message_url: Url,
    /// Destination chat for alerts.
    chat_id: String,
    /// Optional topic routing for alerts, decided by configuration.
    topic_id: Option<i64>,
    /// Configured HTTP client with retry capabilities.
    client: Arc<ClientWithMiddleware>,
}

impl TelegramNotifier {
    /// Creates a new notifier from the Telegram settings.
    pub fn new(
        settings: &TelegramSettings,
        client: Arc<ClientWithMiddleware>,
    ) -> Result<Self, NotificationError> {
        if settings.token.is_empty() {
            return Err(NotificationError::ConfigError("Telegram token cannot be empty".into()));
        }
        if settings.chat_id.is_empty() {
            return Err(NotificationError::ConfigError("Telegram chat ID cannot be empty".into()));
        }
        let send_message_url =
            Url::parse(&format!("https://api.telegram.org/bot{}/sendMessage", settings.token))
                .map_err(|e| NotificationError::ConfigError(format!("Invalid bot token: {e}")))?;
        Ok(Self {
            send_message_url,
            chat_id: settings.chat_id.clone(),
            topic_id: settings.topic_id,
            client,
        })
    }

    /// Sends an HTML message to a specific chat. `topic_id` overrides the
    /// configured topic when provided.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        topic_id: Option<i64>,
    ) -> Result<(), NotificationError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(topic) = topic_id.or(self.topic_id) {
            payload["message_thread_id"] = json!(topic);
        }

        let response = self.client.post(self.send_message_url.clone()).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::NotifyFailed(format!(
                "Telegram returned {status}: {body}"
            )));
        }

        tracing::debug!(chat_id, topic = ?topic_id.or(self.topic_id), "Message sent.");
        Ok(())
    }

    /// Delivers an alert to the configured destination chat.
    pub async fn deliver_alert(&self, text: &str) -> Result<(), NotificationError> {
        self.send_message(&self.chat_id, text, None).await
    }
}

#[async_trait::async_trait]
impl super::AlertSink for TelegramNotifier {
    async fn deliver(&self, text: &str) -> Result<(), NotificationError> {
        self.deliver_alert(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::HttpRetryConfig, http_client::create_retryable_http_client};

    fn client() -> Arc<ClientWithMiddleware> {
        Arc::new(create_retryable_http_client(
            &HttpRetryConfig::default(),
            reqwest::Client::new(),
        ))
    }

    fn settings(token: &str, chat_id: &str) -> TelegramSettings {
        TelegramSettings {
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_empty_token() {
        let result = TelegramNotifier::new(&settings("", "chat"), client());
        assert!(matches!(result, Err(NotificationError::ConfigError(_))));
    }

    #[test]
    fn test_new_rejects_empty_chat_id() {
        let result = TelegramNotifier::new(&settings("token", ""), client());
        assert!(matches!(result, Err(NotificationError::ConfigError(_))));
    }

    #[test]
    fn test_new_builds_send_message_url() {
        let notifier = TelegramNotifier::new(&settings("123:abc", "-1001"), client()).unwrap();
        assert_eq!(
            notifier.send_message_url.as_str(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }
}
