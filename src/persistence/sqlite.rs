//! This module provides a concrete implementation of the KeyValueStore using SQLite.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteRow},
    Row, SqlitePool,
};

use super::{error::PersistenceError, traits::KeyValueStore};

/// SQL query constants for application state operations
mod state_sql {
    /// Select a single state value by key
    pub const SELECT_STATE: &str = "SELECT value FROM application_state WHERE key = ?";

    /// Insert or replace a state value
    pub const UPSERT_STATE: &str =
        "INSERT OR REPLACE INTO application_state (key, value) VALUES (?, ?)";

    /// Select all state rows whose key matches a LIKE pattern
    pub const SELECT_STATES_BY_PREFIX: &str =
        "SELECT key, value FROM application_state WHERE key LIKE ?";
}

/// A SQLite-backed state repository. Values are stored as JSON text so the
/// state file stays inspectable with the sqlite3 CLI and tolerant of older
/// schemas on load.
pub struct SqliteStateRepository {
    /// The SQLite connection pool used for database operations.
    pool: SqlitePool,
}

impl SqliteStateRepository {
    /// Creates a new instance of SqliteStateRepository with the provided database URL.
    /// This will create the database file if it does not exist.
    #[tracing::instrument(level = "info")]
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        tracing::debug!(database_url, "Attempting to connect to SQLite database.");
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        tracing::info!(database_url, "Successfully connected to SQLite database.");
        Ok(Self { pool })
    }

    /// Runs database migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Running database migrations.");
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run database migrations.");
            e
        })?;
        tracing::info!("Database migrations completed successfully.");
        Ok(())
    }

    /// Gets access to the underlying connection pool for advanced operations.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool gracefully.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn close(&self) {
        tracing::debug!("Closing SQLite connection pool.");
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed successfully.");
    }

    /// Ensures all pending writes are flushed to disk. Called during
    /// graceful shutdown.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Flushing pending writes to disk.");
        self.set_synchronous_mode("FULL").await?;
        self.checkpoint_wal("TRUNCATE").await?;
        self.set_synchronous_mode("NORMAL").await?;
        tracing::debug!("Pending writes flushed successfully.");
        Ok(())
    }

    /// Internal helper to execute a PRAGMA command with error handling
    async fn execute_pragma(&self, pragma: &str, operation: &str) -> Result<(), PersistenceError> {
        sqlx::query(pragma).execute(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, pragma = %pragma, operation = %operation, "Failed to execute PRAGMA command.");
            e
        })?;
        Ok(())
    }

    /// Performs a WAL checkpoint with the specified mode
    async fn checkpoint_wal(&self, mode: &str) -> Result<(), PersistenceError> {
        let allowed_modes = ["PASSIVE", "TRUNCATE", "RESTART"];
        if !allowed_modes.contains(&mode) {
            return Err(PersistenceError::Database(sqlx::Error::Protocol(format!(
                "Invalid WAL checkpoint mode: {mode}"
            ))));
        }
        let pragma = format!("PRAGMA wal_checkpoint({mode})");
        self.execute_pragma(&pragma, &format!("WAL checkpoint {mode}")).await
    }

    /// Sets the synchronous mode
    async fn set_synchronous_mode(&self, mode: &str) -> Result<(), PersistenceError> {
        let allowed_modes = ["OFF", "NORMAL", "FULL"];
        if !allowed_modes.contains(&mode) {
            return Err(PersistenceError::Database(sqlx::Error::Protocol(format!(
                "Invalid synchronous mode: {mode}"
            ))));
        }
        let pragma = format!("PRAGMA synchronous = {mode}");
        self.execute_pragma(&pragma, &format!("set synchronous mode to {mode}")).await
    }
}

#[async_trait]
impl KeyValueStore for SqliteStateRepository {
    /// Retrieves a JSON-serializable state object by its key.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_json_state<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistenceError> {
        tracing::debug!(key, "Attempting to retrieve JSON state.");

        let result: Option<SqliteRow> =
            sqlx::query(state_sql::SELECT_STATE).bind(key).fetch_optional(&self.pool).await?;

        match result {
            Some(row) => {
                let value_str: String = row.get("value");
                serde_json::from_str(&value_str)
                    .map(Some)
                    .map_err(|e| PersistenceError::SerializationError(e.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Sets or updates a JSON-serializable state object by its key.
    #[tracing::instrument(skip(self, value), level = "debug")]
    async fn set_json_state<T: Serialize + Send + Sync + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        tracing::debug!(key, "Attempting to set JSON state.");

        let value_str = serde_json::to_string(value)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        sqlx::query(state_sql::UPSERT_STATE)
            .bind(key)
            .bind(value_str)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_all_json_states_by_prefix<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, T)>, PersistenceError> {
        tracing::debug!(prefix, "Attempting to retrieve all JSON states by prefix.");

        let like_prefix = format!("{}%", prefix);
        let rows = sqlx::query(state_sql::SELECT_STATES_BY_PREFIX)
            .bind(like_prefix)
            .fetch_all(&self.pool)
            .await?;

        let mut states = Vec::new();
        for row in rows {
            let key: String = row.get("key");
            let value_str: String = row.get("value");
            match serde_json::from_str(&value_str) {
                Ok(value) => states.push((key, value)),
                Err(e) => {
                    tracing::error!(key, "Failed to decode JSON state: {}", e);
                }
            }
        }

        Ok(states)
    }
}
