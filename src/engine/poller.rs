//! The VolumeMonitor service polls the market-data source and feeds admitted
//! alerts into the delivery queue.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    admission::{AdmissionController, Decision},
    detector,
};
use crate::{
    config::AppConfig,
    models::OutboundAlert,
    notifier::format_alert,
    persistence::traits::KeyValueStore,
    providers::traits::MarketDataSource,
};

/// The market polling service.
///
/// Runs a continuous loop: every poll interval it checks each configured
/// (symbol, timeframe) pair, runs the detector, and pushes admitted
/// candidates into the alert channel for the dispatcher to deliver.
pub struct VolumeMonitor<S: KeyValueStore> {
    /// Shared application configuration.
    config: Arc<AppConfig>,
    /// The market-data source to poll.
    data_source: Arc<dyn MarketDataSource>,
    /// The admission controller deciding which candidates become alerts.
    admission: Arc<AdmissionController<S>>,
    /// The sender feeding the alert dispatcher.
    alerts_tx: mpsc::Sender<OutboundAlert>,
    /// Operator-controlled pause flag. When false, poll cycles are skipped.
    running: Arc<AtomicBool>,
    /// A token used to signal a graceful shutdown.
    cancellation_token: CancellationToken,
}

impl<S: KeyValueStore> VolumeMonitor<S> {
    /// Creates a new VolumeMonitor instance.
    pub fn new(
        config: Arc<AppConfig>,
        data_source: Arc<dyn MarketDataSource>,
        admission: Arc<AdmissionController<S>>,
        alerts_tx: mpsc::Sender<OutboundAlert>,
        running: Arc<AtomicBool>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { config, data_source, admission, alerts_tx, running, cancellation_token }
    }

    /// Starts the long-running polling loop.
    pub async fn run(self) {
        loop {
            let polling_delay = tokio::time::sleep(self.config.poll_interval);

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("VolumeMonitor cancellation signal received, shutting down...");
                    break;
                }

                _ = polling_delay => {
                    self.check_cycle().await;
                }
            }
        }
        tracing::info!("VolumeMonitor has shut down.");
    }

    /// Performs one poll cycle over all configured pairs.
    async fn check_cycle(&self) {
        if !self.running.load(Ordering::SeqCst) {
            tracing::debug!("Monitoring is paused, skipping volume check.");
            return;
        }

        for symbol in &self.config.symbols {
            for (timeframe, policy) in &self.config.timeframes {
                if self.cancellation_token.is_cancelled() {
                    return;
                }
                if let Err(e) = self.check_pair(symbol, *timeframe, policy.threshold_pct).await {
                    tracing::error!(symbol, %timeframe, error = %e, "Error checking pair.");
                }
            }
        }
    }

    /// Checks a single (symbol, timeframe) pair and forwards an admitted
    /// candidate to the dispatcher.
    async fn check_pair(
        &self,
        symbol: &str,
        timeframe: crate::models::Timeframe,
        threshold_pct: f64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Some((current, previous)) = self.data_source.latest_pair(symbol, timeframe).await?
        else {
            return Ok(());
        };

        let Some(spike) =
            detector::detect(symbol, timeframe, threshold_pct, &current, &previous, Utc::now())
        else {
            return Ok(());
        };

        tracing::info!(
            symbol,
            %timeframe,
            change_pct = spike.change_pct,
            "Volume spike detected."
        );

        match self.admission.decide(&spike).await {
            Ok(Decision::Admit) => {
                let alert = OutboundAlert {
                    symbol: spike.symbol.clone(),
                    timeframe: spike.timeframe,
                    text: format_alert(&spike),
                };
                if self.alerts_tx.send(alert).await.is_err() {
                    tracing::warn!("Alert channel closed, dropping admitted alert.");
                }
            }
            Ok(Decision::Reject(_)) => {
                // Already logged with its reason by the controller.
            }
            Err(e) => {
                // Fail closed: an admission that could not be recorded is
                // not forwarded.
                tracing::error!(symbol, %timeframe, error = %e, "Admission decision failed.");
            }
        }

        Ok(())
    }
}
