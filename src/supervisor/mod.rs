//! The Supervisor module manages the lifecycle of the volwatch application.
//!
//! It owns all long-running services (the market poller, the alert
//! dispatcher, and the command listener), starts them, monitors their
//! health, and orchestrates a graceful shutdown on SIGINT/SIGTERM. If any
//! supervised task fails, every other service is shut down so the process
//! exits cleanly rather than continuing partially functional.

mod builder;

use std::sync::{atomic::AtomicBool, Arc};

pub use builder::SupervisorBuilder;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::{signal, sync::mpsc};

use crate::{
    commands::CommandListener,
    config::AppConfig,
    dispatch::AlertDispatcher,
    engine::{AdmissionController, VolumeMonitor},
    models::OutboundAlert,
    notifier::{AlertSink, NotificationError, TelegramNotifier},
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository},
    providers::traits::MarketDataSource,
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A state repository was not provided to the `SupervisorBuilder`.
    #[error("Missing state repository for Supervisor")]
    MissingStateRepository,

    /// A data source was not provided to the `SupervisorBuilder`.
    #[error("Missing data source for Supervisor")]
    MissingDataSource,

    /// An HTTP client was not provided to the `SupervisorBuilder`.
    #[error("Missing HTTP client for Supervisor")]
    MissingHttpClient,

    /// The notifier could not be constructed from the configuration.
    #[error("Notifier error: {0}")]
    Notifier(#[from] NotificationError),

    /// An error occurred in the state repository.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// The primary runtime manager for the application.
///
/// The Supervisor owns all the major components and is responsible for their
/// startup, shutdown, and health monitoring. Once `run` is called, it becomes
/// the main process loop for the entire application.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The persistent state repository backing admission decisions.
    state: Arc<SqliteStateRepository>,

    /// The market-data source polled for candles.
    data_source: Arc<dyn MarketDataSource>,

    /// The shared HTTP client used by the Telegram transport.
    http_client: Arc<ClientWithMiddleware>,

    /// The Telegram transport used for both alerts and command replies.
    notifier: Arc<TelegramNotifier>,

    /// The controller deciding which detected spikes become alerts.
    admission: Arc<AdmissionController<SqliteStateRepository>>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: tokio_util::sync::CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: tokio::task::JoinSet<()>,
}

impl Supervisor {
    /// Creates a new `SupervisorBuilder` to configure and build a Supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Starts the supervisor and all its managed services.
    ///
    /// Spawns a signal handler, the `VolumeMonitor`, the `AlertDispatcher`,
    /// and the `CommandListener`, then blocks monitoring task health until a
    /// shutdown signal arrives or a task fails. Shutdown drains the task set
    /// and flushes the state repository, bounded by the configured timeout.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        // Clone the token for the signal handler task.
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a task to listen for shutdown signals.
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
            }

            // Notify all other tasks to begin shutting down.
            cancellation_token.cancel();
        });

        // --- Service Initialization ---

        // The channel connecting the VolumeMonitor to the AlertDispatcher.
        let (alerts_tx, alerts_rx) =
            mpsc::channel::<OutboundAlert>(self.config.alert_channel_capacity as usize);

        // Monitoring starts active; the owner can pause it over Telegram.
        let running = Arc::new(AtomicBool::new(true));

        // --- Task Spawning ---

        let monitor = VolumeMonitor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.data_source),
            Arc::clone(&self.admission),
            alerts_tx,
            Arc::clone(&running),
            self.cancellation_token.clone(),
        );
        self.join_set.spawn(async move {
            monitor.run().await;
        });

        let dispatcher = AlertDispatcher::new(
            Arc::clone(&self.notifier) as Arc<dyn AlertSink>,
            self.config.dispatch_spacing,
            self.config.http_retry_config.clone(),
            alerts_rx,
            self.cancellation_token.clone(),
        );
        self.join_set.spawn(async move {
            dispatcher.run().await;
        });

        let listener = CommandListener::new(
            self.config.telegram.clone(),
            Arc::clone(&self.http_client),
            Arc::clone(&self.notifier),
            Arc::clone(&running),
            Arc::clone(&self.state),
            self.cancellation_token.clone(),
        )?;
        self.join_set.spawn(async move {
            listener.run().await;
        });

        // --- Main Supervisor Loop ---

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {
                            // Task completed, continue monitoring the rest.
                        }
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => {
                            // All tasks have completed.
                            break;
                        }
                    }
                }
                _ = self.cancellation_token.cancelled() => {
                    break;
                }
            }
        }

        // --- Graceful Shutdown ---

        // Ensure all spawned tasks are properly awaited before cleanup.
        self.join_set.shutdown().await;
        tracing::info!("All supervised tasks have completed.");

        tracing::info!("Starting graceful resource cleanup...");
        let shutdown_timeout = self.config.shutdown_timeout;

        let cleanup_logic = async {
            if let Err(e) = self.state.flush().await {
                tracing::error!(error = %e, "Failed to flush pending writes, but continuing cleanup.");
            }
            self.state.close().await;
        };

        if tokio::time::timeout(shutdown_timeout, cleanup_logic).await.is_err() {
            tracing::warn!(
                "Cleanup did not complete within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        } else {
            tracing::info!("Cleanup completed successfully.");
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
