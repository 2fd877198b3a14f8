//! Error types for sqlvec-db.

use sqlvec_core::CoreError;
use thiserror::Error;

/// Result type alias for sqlvec-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in sqlvec-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Input errors
    // ========================================================================
    /// Vector length differs from the table dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The operation needs a record that does not exist.
    #[error("Vector {id} not found")]
    NotFound { id: i64 },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ========================================================================
    // Index errors
    // ========================================================================
    /// Index metadata cannot support the requested operation.
    #[error("Inconsistent index state: {message}")]
    InconsistentIndexState { message: String },

    /// Persisted table metadata disagrees with the configuration.
    #[error("Vector table '{table}' is incompatible: {reason}")]
    IndexIncompatible { table: String, reason: String },

    // ========================================================================
    // Environment errors
    // ========================================================================
    /// The backing store failed. The message is the storage engine's own.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// The embedder failed to produce vectors.
    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an inconsistent index state error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentIndexState {
            message: message.into(),
        }
    }

    /// Create a table incompatible error.
    pub fn incompatible(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IndexIncompatible {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller passed something invalid. Retrying will not help.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::NotFound { .. } | Self::Config { .. }
        )
    }

    /// Whether the failure came from the environment and may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Embedding { .. })
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            CoreError::InvalidConfig { message } => Self::Config { message },
            CoreError::EmptySample => Self::inconsistent("cannot cluster an empty sample"),
            CoreError::Embedding { message } => Self::Embedding { message },
        }
    }
}
