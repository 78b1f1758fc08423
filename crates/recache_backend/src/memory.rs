//! In-memory cache backend.

use crate::backend::CacheBackend;
use crate::error::{BackendError, BackendResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default maximum key length, matching memcached.
pub const DEFAULT_MAX_KEY_LEN: usize = 250;

/// Default maximum value size, matching memcached's 1 MB item limit.
pub const DEFAULT_MAX_VALUE_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// An in-memory cache backend.
///
/// Suitable for:
/// - Unit and integration tests
/// - Single-process deployments that do not need a shared cache
///
/// Entries honour their TTL lazily: an expired entry reads as absent and is
/// dropped on the next write or [`purge_expired`](Self::purge_expired).
///
/// # Example
///
/// ```rust
/// use recache_backend::{CacheBackend, InMemoryCache};
///
/// let cache = InMemoryCache::new();
/// cache.set("user:1/id/1", b"payload", None).unwrap();
/// assert_eq!(cache.get("user:1/id/1").unwrap(), Some(b"payload".to_vec()));
/// ```
#[derive(Debug)]
pub struct InMemoryCache {
    slots: RwLock<HashMap<String, Slot>>,
    max_key_len: usize,
    max_value_len: usize,
    round_trips: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            max_key_len: DEFAULT_MAX_KEY_LEN,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            round_trips: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

impl InMemoryCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum accepted key length.
    #[must_use]
    pub fn with_max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Sets the maximum accepted value size.
    #[must_use]
    pub fn with_max_value_len(mut self, len: usize) -> Self {
        self.max_value_len = len;
        self
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots.read().values().filter(|s| s.is_live(now)).count()
    }

    /// Returns true if no live entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` holds a live entry. Does not touch the counters.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.slots.read().get(key).is_some_and(|s| s.is_live(now))
    }

    /// Returns all live keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, s)| s.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drops an entry as if the cache had evicted it.
    pub fn evict(&self, key: &str) -> bool {
        self.slots.write().remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, s| s.is_live(now));
        before - slots.len()
    }

    /// Number of read requests served (`get` and `get_multi` each count once).
    #[must_use]
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Number of keys found on read.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of keys absent on read.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of `set` calls accepted.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of `delete` calls served.
    #[must_use]
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    fn check_key(&self, key: &str) -> BackendResult<()> {
        if key.is_empty() {
            return Err(BackendError::InvalidKey {
                key: key.to_string(),
                reason: "empty key".into(),
            });
        }
        if key.len() > self.max_key_len {
            return Err(BackendError::InvalidKey {
                key: key.to_string(),
                reason: format!("longer than {} bytes", self.max_key_len),
            });
        }
        Ok(())
    }

    fn record_lookup(&self, found: bool) {
        if found {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl CacheBackend for InMemoryCache {
    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        self.check_key(key)?;
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let value = self
            .slots
            .read()
            .get(key)
            .filter(|s| s.is_live(now))
            .map(|s| s.value.clone());
        self.record_lookup(value.is_some());
        Ok(value)
    }

    fn get_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        for key in keys {
            self.check_key(key)?;
        }
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let slots = self.slots.read();
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = slots.get(key).filter(|s| s.is_live(now));
            self.record_lookup(value.is_some());
            if let Some(slot) = value {
                found.insert(key.clone(), slot.value.clone());
            }
        }
        Ok(found)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> BackendResult<()> {
        self.check_key(key)?;
        if value.len() > self.max_value_len {
            return Err(BackendError::ValueTooLarge {
                key: key.to_string(),
                len: value.len(),
                limit: self.max_value_len,
            });
        }
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.slots.write().insert(
            key.to_string(),
            Slot {
                value: value.to_vec(),
                expires_at,
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete(&self, key: &str) -> BackendResult<()> {
        self.check_key(key)?;
        self.slots.write().remove(key);
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
