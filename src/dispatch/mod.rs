//! The alert delivery queue.
//!
//! Admitted alerts are queued in arrival order and released one at a time,
//! never closer together than the configured spacing interval. The spacing
//! clock is global: it is shared across all keys and is a different
//! mechanism from the per-key cooldown tracked by the admission controller.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{config::HttpRetryConfig, models::OutboundAlert, notifier::AlertSink};

/// The background dispatcher draining the alert channel.
///
/// Owns the only mutable reference to the global last-dispatch time. The
/// mpsc channel provides both the FIFO ordering and the suspension point:
/// the loop genuinely waits on channel recv and on the next-dispatch
/// deadline, never busy-polls.
pub struct AlertDispatcher {
    /// The sink alerts are delivered through.
    sink: Arc<dyn AlertSink>,
    /// Global minimum spacing between two deliveries.
    spacing: Duration,
    /// Backoff bounds for transient delivery failures.
    retry_config: HttpRetryConfig,
    /// The receiving end of the alert queue.
    alerts_rx: mpsc::Receiver<OutboundAlert>,
    /// A token used to signal a graceful shutdown.
    cancellation_token: CancellationToken,
}

impl AlertDispatcher {
    /// Creates a new dispatcher draining `alerts_rx` into `sink`.
    pub fn new(
        sink: Arc<dyn AlertSink>,
        spacing: Duration,
        retry_config: HttpRetryConfig,
        alerts_rx: mpsc::Receiver<OutboundAlert>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { sink, spacing, retry_config, alerts_rx, cancellation_token }
    }

    /// Runs the dispatch loop until cancelled or the alert channel closes.
    ///
    /// In-flight queue entries are abandoned on shutdown; they represent
    /// not-yet-delivered notifications, not committed state.
    pub async fn run(mut self) {
        let mut last_dispatch: Option<Instant> = None;

        loop {
            let alert = tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("AlertDispatcher cancellation signal received, shutting down...");
                    break;
                }

                maybe_alert = self.alerts_rx.recv() => match maybe_alert {
                    Some(alert) => alert,
                    None => {
                        tracing::info!("Alert channel closed, stopping dispatcher.");
                        break;
                    }
                },
            };

            // Hold the head of the queue until the spacing floor is met.
            if let Some(last) = last_dispatch {
                let due = last + self.spacing;
                tokio::select! {
                    biased;
                    _ = self.cancellation_token.cancelled() => {
                        tracing::info!("AlertDispatcher cancelled while waiting for dispatch slot.");
                        break;
                    }
                    _ = sleep_until(due) => {}
                }
            }

            if self.deliver_with_retry(&alert).await {
                // The spacing clock only advances on successful delivery, so
                // the guarantee is relative to deliveries, not attempts.
                last_dispatch = Some(Instant::now());
            } else {
                break;
            }
        }
        tracing::info!("AlertDispatcher has shut down.");
    }

    /// Attempts delivery, retrying with exponential backoff until it
    /// succeeds or shutdown is requested. Returns false only on shutdown.
    async fn deliver_with_retry(&self, alert: &OutboundAlert) -> bool {
        let mut backoff = self.retry_config.initial_backoff_ms;
        let mut attempt: u32 = 0;

        loop {
            match self.sink.deliver(&alert.text).await {
                Ok(()) => {
                    tracing::info!(
                        symbol = %alert.symbol,
                        timeframe = %alert.timeframe,
                        "Alert delivered."
                    );
                    return true;
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        symbol = %alert.symbol,
                        timeframe = %alert.timeframe,
                        attempt,
                        error = %e,
                        "Alert delivery failed, retrying after backoff."
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancellation_token.cancelled() => return false,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = std::cmp::min(
                        backoff.saturating_mul(self.retry_config.base_for_backoff),
                        self.retry_config.max_backoff_secs,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{models::Timeframe, notifier::NotificationError};

    /// Records delivery times (in virtual time) and can fail a configured
    /// number of leading attempts.
    struct RecordingSink {
        deliveries: Mutex<Vec<(Instant, String)>>,
        failures_remaining: Mutex<u32>,
    }

    impl RecordingSink {
        fn new(failures: u32) -> Self {
            Self { deliveries: Mutex::new(Vec::new()), failures_remaining: Mutex::new(failures) }
        }

        fn delivered(&self) -> Vec<(Instant, String)> {
            self.deliveries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn deliver(&self, text: &str) -> Result<(), NotificationError> {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(NotificationError::NotifyFailed("transient".into()));
            }
            drop(failures);
            self.deliveries.lock().unwrap().push((Instant::now(), text.to_string()));
            Ok(())
        }
    }

    fn alert(text: &str) -> OutboundAlert {
        OutboundAlert { symbol: "BTCUSDT".into(), timeframe: Timeframe::H1, text: text.into() }
    }

    async fn wait_for_deliveries(sink: &RecordingSink, count: usize) {
        for _ in 0..20_000 {
            if sink.delivered().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("expected {count} deliveries, got {}", sink.delivered().len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_and_global_spacing() {
        let sink = Arc::new(RecordingSink::new(0));
        let (tx, rx) = mpsc::channel(8);
        let spacing = Duration::from_secs(600);
        let dispatcher = AlertDispatcher::new(
            sink.clone(),
            spacing,
            HttpRetryConfig::default(),
            rx,
            CancellationToken::new(),
        );
        let handle = tokio::spawn(dispatcher.run());

        // Three alerts admitted in a burst.
        tx.send(alert("first")).await.unwrap();
        tx.send(alert("second")).await.unwrap();
        tx.send(alert("third")).await.unwrap();

        wait_for_deliveries(&sink, 3).await;
        let delivered = sink.delivered();

        // FIFO preserved.
        let texts: Vec<_> = delivered.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);

        // No two dispatches closer than the spacing interval.
        for pair in delivered.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= spacing);
        }

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_preserves_payload_and_spacing() {
        // First two attempts for the head alert fail.
        let sink = Arc::new(RecordingSink::new(2));
        let (tx, rx) = mpsc::channel(8);
        let spacing = Duration::from_secs(600);
        let dispatcher = AlertDispatcher::new(
            sink.clone(),
            spacing,
            HttpRetryConfig::default(),
            rx,
            CancellationToken::new(),
        );
        let handle = tokio::spawn(dispatcher.run());

        tx.send(alert("first")).await.unwrap();
        tx.send(alert("second")).await.unwrap();

        wait_for_deliveries(&sink, 2).await;
        let delivered = sink.delivered();

        // The failing payload was not dropped and kept its queue position.
        assert_eq!(delivered[0].1, "first");
        assert_eq!(delivered[1].1, "second");

        // Spacing is measured from the successful delivery of "first".
        assert!(delivered[1].0 - delivered[0].0 >= spacing);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_dispatcher() {
        let sink = Arc::new(RecordingSink::new(0));
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let dispatcher = AlertDispatcher::new(
            sink.clone(),
            Duration::from_secs(600),
            HttpRetryConfig::default(),
            rx,
            token.clone(),
        );
        let handle = tokio::spawn(dispatcher.run());

        tx.send(alert("first")).await.unwrap();
        wait_for_deliveries(&sink, 1).await;

        // "second" is queued behind the spacing window when shutdown hits;
        // abandoning it is allowed.
        tx.send(alert("second")).await.unwrap();
        token.cancel();
        handle.await.unwrap();

        assert_eq!(sink.delivered().len(), 1);
    }
}
