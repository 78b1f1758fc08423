//! Error types for the cache engine.

use crate::types::RecordId;
use thiserror::Error;

/// Result type for engine operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Boxed error raised by a backing record store.
pub type StoreFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced to callers of the cache engine.
///
/// Queries that cannot be served from the cache are not errors; they take
/// the bypass path (see [`crate::BypassReason`]).
#[derive(Debug, Error)]
pub enum CacheError {
    /// An identifier lookup that required a result found nothing.
    #[error("record not found: {model} with ids {ids:?}")]
    RecordNotFound {
        /// The type that was queried.
        model: String,
        /// The identifiers that were requested.
        ids: Vec<RecordId>,
    },

    /// The backing cache failed.
    #[error("cache backend error: {0}")]
    Backend(#[from] recache_backend::BackendError),

    /// The backing record store failed.
    #[error("record store error: {0}")]
    Store(#[source] StoreFailure),

    /// A cache entry could not be encoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The cache configuration is inconsistent.
    #[error("invalid cache configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CacheError {
    /// Creates a record-not-found error.
    pub fn record_not_found(model: impl Into<String>, ids: Vec<RecordId>) -> Self {
        Self::RecordNotFound {
            model: model.into(),
            ids,
        }
    }

    /// Wraps a backing store failure.
    pub fn store(error: impl Into<StoreFailure>) -> Self {
        Self::Store(error.into())
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true for [`CacheError::RecordNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}
