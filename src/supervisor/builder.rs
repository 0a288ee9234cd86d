//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use reqwest_middleware::ClientWithMiddleware;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig, engine::AdmissionController, notifier::TelegramNotifier,
    persistence::sqlite::SqliteStateRepository, providers::traits::MarketDataSource,
};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    state: Option<Arc<SqliteStateRepository>>,
    data_source: Option<Arc<dyn MarketDataSource>>,
    http_client: Option<Arc<ClientWithMiddleware>>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the state repository (database connection) for the `Supervisor`.
    pub fn state(mut self, state: Arc<SqliteStateRepository>) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the market-data source for the `Supervisor`.
    pub fn data_source(mut self, data_source: Arc<dyn MarketDataSource>) -> Self {
        self.data_source = Some(data_source);
        self
    }

    /// Sets the shared HTTP client used by the Telegram transport.
    pub fn http_client(mut self, http_client: Arc<ClientWithMiddleware>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    ///
    /// This performs the final wiring of the application's services: the
    /// admission controller is bound to the state repository and the policy
    /// table, and the Telegram transport is constructed from configuration.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let state = self.state.ok_or(SupervisorError::MissingStateRepository)?;
        let data_source = self.data_source.ok_or(SupervisorError::MissingDataSource)?;
        let http_client = self.http_client.ok_or(SupervisorError::MissingHttpClient)?;

        let notifier =
            Arc::new(TelegramNotifier::new(&config.telegram, Arc::clone(&http_client))?);
        let admission = Arc::new(AdmissionController::new(
            Arc::clone(&state),
            Arc::new(config.timeframes.clone()),
        ));

        Ok(Supervisor {
            config: Arc::new(config),
            state,
            data_source,
            http_client,
            notifier,
            admission,
            cancellation_token: tokio_util::sync::CancellationToken::new(),
            join_set: tokio::task::JoinSet::new(),
        })
    }
}
