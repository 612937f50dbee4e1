use thiserror::Error;

use crate::types::PlayerId;

/// Errors that can arise while loading or persisting player documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around IO errors (directory creation, file writes, locking).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Returned when a stored document carries an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u32,
        found: u32,
    },

    /// A file name under the players directory that is not a player id.
    #[error("invalid player id: {0}")]
    InvalidId(String),

    /// Returned when an operation needs a document that was never stored.
    #[error("unknown player: {0}")]
    UnknownPlayer(PlayerId),

    /// Blocking task failed to complete.
    #[error("internal error: {0}")]
    Internal(String),
}
