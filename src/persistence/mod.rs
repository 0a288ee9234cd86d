//! Durable state storage for admission decisions.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStateRepository;
