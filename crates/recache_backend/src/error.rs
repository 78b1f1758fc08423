//! Error types for backing cache operations.

use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while talking to a backing cache.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The cache server could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The cache rejected the key.
    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The value exceeds the backend's item size limit.
    #[error("value for {key:?} too large: {len} bytes, limit {limit}")]
    ValueTooLarge {
        /// The key being written.
        key: String,
        /// Size of the value in bytes.
        len: usize,
        /// Maximum accepted size.
        limit: usize,
    },

    /// The request failed mid-flight.
    #[error("cache operation failed: {0}")]
    Operation(String),
}

impl BackendError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates an operation error.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(message.into())
    }
}
