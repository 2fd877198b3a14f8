//! Error types for sqlvec-core.

use thiserror::Error;

/// Result type alias for sqlvec-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in sqlvec-core operations.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// Two vectors (or a vector and a table) disagree on dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A configuration value failed validation.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Clustering was asked to run without input.
    #[error("Cannot cluster an empty sample")]
    EmptySample,

    /// The embedder failed to produce vectors.
    #[error("Embedding failed: {message}")]
    Embedding { message: String },
}

impl CoreError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }
}
