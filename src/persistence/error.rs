//! Error types for the persistence layer.

use thiserror::Error;

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The underlying database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database migrations failed to run.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
