//! Operator control over Telegram bot commands.
//!
//! A lightweight getUpdates poll loop lets the configured owner pause and
//! resume monitoring at runtime and query the current admission state.
//! Anyone else who starts a private chat with the bot gets a welcome
//! message and nothing more.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::TelegramSettings,
    engine::ADMISSION_STATE_PREFIX,
    models::AdmissionState,
    notifier::{NotificationError, TelegramNotifier},
    persistence::traits::KeyValueStore,
};

/// A recognized operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Resume the monitoring cycle.
    Start,
    /// Pause the monitoring cycle.
    Stop,
    /// Report the running flag and per-key admission counters.
    Status,
}

/// Parses a message into a command.
///
/// Accepts the bare form (`/stop`) and the mention form (`/stop@bot_name`).
/// When `bot_username` is known, a mention addressed to a different bot is
/// ignored so the listener stays quiet in shared group chats.
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let first_word = text.trim().split_whitespace().next()?;
    let (command, mention) = match first_word.split_once('@') {
        Some((command, mention)) => (command, Some(mention)),
        None => (first_word, None),
    };
    if let (Some(mention), Some(expected)) = (mention, bot_username) {
        if !mention.eq_ignore_ascii_case(expected.trim_start_matches('@')) {
            return None;
        }
    }
    match command {
        "/start" => Some(Command::Start),
        "/stop" => Some(Command::Stop),
        "/status" => Some(Command::Status),
        _ => None,
    }
}

/// The welcome message sent when a non-owner opens a private chat.
pub fn welcome_message() -> String {
    "👋 Hi! I watch trading volume on Binance and post alerts when it spikes.\n\
     Alerts are published to a configured channel; this chat stays quiet."
        .to_string()
}

/// Renders the /status reply from the running flag and persisted admission
/// state. Keys are sorted so repeated queries are comparable.
pub fn status_message(running: bool, states: &[(String, AdmissionState)]) -> String {
    let mut lines = vec![format!(
        "Monitoring: <b>{}</b>",
        if running { "running" } else { "paused" }
    )];
    let mut sorted: Vec<_> = states.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, state) in sorted {
        let key = key.strip_prefix(ADMISSION_STATE_PREFIX).unwrap_or(key);
        lines.push(format!(
            "<code>{}</code>: {} alert(s) in period {}",
            key, state.alerts_sent_in_period, state.period_key
        ));
    }
    if states.is_empty() {
        lines.push("No admission state recorded yet.".to_string());
    }
    lines.join("\n")
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

/// Polls Telegram for operator commands and applies them.
pub struct CommandListener<T: KeyValueStore> {
    settings: TelegramSettings,
    get_updates_url: Url,
    client: Arc<ClientWithMiddleware>,
    notifier: Arc<TelegramNotifier>,
    running: Arc<AtomicBool>,
    state_repository: Arc<T>,
    cancellation_token: CancellationToken,
    /// Offset of the next update to fetch, per the getUpdates protocol.
    next_offset: i64,
}

impl<T: KeyValueStore> CommandListener<T> {
    /// Creates a new listener. Fails only on an unparseable bot token.
    pub fn new(
        settings: TelegramSettings,
        client: Arc<ClientWithMiddleware>,
        notifier: Arc<TelegramNotifier>,
        running: Arc<AtomicBool>,
        state_repository: Arc<T>,
        cancellation_token: CancellationToken,
    ) -> Result<Self, NotificationError> {
        let get_updates_url =
            Url::parse(&format!("https://api.telegram.org/bot{}/getUpdates", settings.token))
                .map_err(|e| NotificationError::ConfigError(format!("Invalid bot token: {e}")))?;
        Ok(Self {
            settings,
            get_updates_url,
            client,
            notifier,
            running,
            state_repository,
            cancellation_token,
            next_offset: 0,
        })
    }

    /// Runs the command loop until cancelled.
    pub async fn run(mut self) {
        // Updates that arrived while the process was down are stale; skip
        // past them so a queued /stop from last week is not replayed.
        if let Err(e) = self.drain_pending().await {
            tracing::warn!(error = %e, "Failed to drain pending updates, continuing.");
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("CommandListener cancellation signal received, shutting down...");
                    break;
                }

                _ = tokio::time::sleep(self.settings.command_poll_interval) => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!(error = %e, "Command poll failed.");
                    }
                }
            }
        }
        tracing::info!("CommandListener has shut down.");
    }

    /// Fetches any backlog of updates and advances the offset past it
    /// without acting on the contents.
    async fn drain_pending(&mut self) -> Result<(), NotificationError> {
        let updates = self.fetch_updates().await?;
        if let Some(last) = updates.last() {
            self.next_offset = last.update_id + 1;
            tracing::info!(count = updates.len(), "Discarded updates queued before startup.");
        }
        Ok(())
    }

    async fn fetch_updates(&self) -> Result<Vec<Update>, NotificationError> {
        let response = self
            .client
            .get(self.get_updates_url.clone())
            .query(&[("offset", self.next_offset), ("timeout", 0)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::NotifyFailed(format!(
                "getUpdates returned {status}: {body}"
            )));
        }
        let parsed: UpdatesResponse = response.json().await?;
        Ok(parsed.result)
    }

    async fn poll_once(&mut self) -> Result<(), NotificationError> {
        let updates = self.fetch_updates().await?;
        for update in updates {
            self.next_offset = self.next_offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            if let Err(e) = self.handle_message(&message).await {
                tracing::warn!(error = %e, "Failed to handle command message.");
            }
        }
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<(), NotificationError> {
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let Some(command) = parse_command(text, self.settings.bot_username.as_deref()) else {
            return Ok(());
        };

        let sender = message.from.as_ref().map(|u| u.id);
        if sender != Some(self.settings.owner_chat_id) {
            // Replies only in private chats; the listener stays silent in
            // groups it happens to share with other bots.
            if message.chat.kind == "private" {
                let reply = match command {
                    Command::Start => welcome_message(),
                    _ => "⛔ This command is reserved for the bot owner.".to_string(),
                };
                self.notifier
                    .send_message(&message.chat.id.to_string(), &reply, None)
                    .await?;
            }
            return Ok(());
        }

        let reply = match command {
            Command::Start => {
                self.running.store(true, Ordering::SeqCst);
                tracing::info!("Monitoring resumed by owner command.");
                "▶️ Monitoring resumed.".to_string()
            }
            Command::Stop => {
                self.running.store(false, Ordering::SeqCst);
                tracing::info!("Monitoring paused by owner command.");
                "⏸️ Monitoring paused.".to_string()
            }
            Command::Status => {
                let states = self
                    .state_repository
                    .get_all_json_states_by_prefix::<AdmissionState>(ADMISSION_STATE_PREFIX)
                    .await
                    .map_err(|e| NotificationError::NotifyFailed(e.to_string()))?;
                status_message(self.running.load(Ordering::SeqCst), &states)
            }
        };
        self.notifier
            .send_message(&message.chat.id.to_string(), &reply, None)
            .await
    }
}
