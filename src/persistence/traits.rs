//! State management interfaces for the volwatch application.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{de::DeserializeOwned, Serialize};

use super::error::PersistenceError;

/// A generic JSON key-value store for durable application state.
///
/// Admission state is kept here, one record per (symbol, timeframe) key.
/// Implementations must make `set_json_state` durable before returning, so
/// an admission is never signaled ahead of its persisted record.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieves a JSON-serializable state object by its key.
    async fn get_json_state<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistenceError>;

    /// Sets or updates a JSON-serializable state object by its key.
    async fn set_json_state<T: Serialize + Send + Sync + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError>;

    /// Retrieves all states whose key starts with the given prefix.
    async fn get_all_json_states_by_prefix<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, T)>, PersistenceError>;
}
