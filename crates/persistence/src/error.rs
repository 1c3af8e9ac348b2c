//! Persistence error types.

use domain::AlarmError;
use thiserror::Error;

/// Errors raised by stores and repositories.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Stored snapshot under '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl PersistenceError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, PersistenceError::Corrupt { .. })
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Io(err.to_string())
    }
}

impl From<PersistenceError> for AlarmError {
    fn from(err: PersistenceError) -> Self {
        AlarmError::Storage(err.to_string())
    }
}
