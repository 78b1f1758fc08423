//! Backing cache trait definition.

use crate::error::BackendResult;
use std::collections::HashMap;
use std::time::Duration;

/// A shared key-value cache such as memcached.
///
/// Backends are **opaque byte stores**. They never interpret values; the
/// engine owns the entry format. Entries may disappear at any time
/// (eviction, expiry) and callers must treat that as a miss.
///
/// # Invariants
///
/// - `get` and `set` are atomic per key
/// - `get_multi` is a single round trip for all requested keys
/// - `delete` of an absent key succeeds
/// - Backends must be `Send + Sync`; they are shared across threads
///
/// # Implementors
///
/// - [`super::InMemoryCache`] - For tests and single-process deployments
pub trait CacheBackend: Send + Sync {
    /// Returns the value stored at `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;

    /// Fetches many keys in one round trip.
    ///
    /// The returned map only contains the keys that are present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn get_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>>;

    /// Stores `value` at `key`, replacing any previous value.
    ///
    /// A `ttl` of `None` keeps the entry until it is evicted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected or the backend cannot
    /// be reached.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> BackendResult<()>;

    /// Removes `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn delete(&self, key: &str) -> BackendResult<()>;
}

impl<B: CacheBackend + ?Sized> CacheBackend for std::sync::Arc<B> {
    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn get_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        (**self).get_multi(keys)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> BackendResult<()> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> BackendResult<()> {
        (**self).delete(key)
    }
}
