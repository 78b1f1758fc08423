//! A cache backend with switchable failures.

use recache_backend::{BackendError, BackendResult, CacheBackend, InMemoryCache};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Wraps an [`InMemoryCache`] and fails reads or writes on demand.
#[derive(Debug, Default)]
pub struct FaultyCache {
    inner: InMemoryCache,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failures: AtomicUsize,
}

impl FaultyCache {
    /// Creates a healthy cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `get` and `get_multi` fail while `fail` is true.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `delete` fail while `fail` is true.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped cache, for inspecting stored entries.
    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }

    /// Number of operations that were failed.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> BackendResult<()> {
        if flag.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(BackendError::unavailable(format!("injected {op} failure")));
        }
        Ok(())
    }
}

impl CacheBackend for FaultyCache {
    fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        self.check(&self.fail_reads, "get")?;
        self.inner.get(key)
    }

    fn get_multi(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<u8>>> {
        self.check(&self.fail_reads, "get_multi")?;
        self.inner.get_multi(keys)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> BackendResult<()> {
        self.check(&self.fail_writes, "set")?;
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> BackendResult<()> {
        self.check(&self.fail_writes, "delete")?;
        self.inner.delete(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_switchable() {
        let cache = FaultyCache::new();
        cache.set("k", b"v", None).unwrap();

        cache.fail_reads(true);
        assert!(cache.get("k").is_err());
        assert!(cache.get_multi(&["k".to_string()]).is_err());
        cache.set("j", b"w", None).unwrap();

        cache.fail_reads(false);
        cache.fail_writes(true);
        assert_eq!(cache.get("j").unwrap(), Some(b"w".to_vec()));
        assert!(cache.delete("k").is_err());
        assert_eq!(cache.failures(), 3);
    }
}
