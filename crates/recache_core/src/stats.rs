//! Cache engine statistics.
//!
//! Counters are atomic and can be read while operations are in progress.
//!
//! ```rust,ignore
//! let stats = cached.stats();
//! println!("hit rate: {:.2}", stats.hit_rate());
//! println!("store fetches: {}", stats.store_fetches());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by a [`crate::CachedStore`].
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Keys found in the cache.
    hits: AtomicU64,
    /// Keys absent from the cache.
    misses: AtomicU64,
    /// Reads sent straight to the store.
    bypasses: AtomicU64,
    /// Store calls made to resolve misses.
    store_fetches: AtomicU64,
    /// Lifecycle hooks processed.
    write_throughs: AtomicU64,
    /// Entries deleted by write-through.
    invalidations: AtomicU64,
    /// Reads that fell back to the store because the cache failed.
    degraded_reads: AtomicU64,
}

impl CacheStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hits(&self, n: usize) {
        self.hits.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_misses(&self, n: usize) {
        self.misses.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_fetch(&self) {
        self.store_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_through(&self) {
        self.write_throughs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_degraded_read(&self) {
        self.degraded_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the number of bypassed reads.
    pub fn bypasses(&self) -> u64 {
        self.bypasses.load(Ordering::Relaxed)
    }

    /// Returns the number of store calls made to resolve misses.
    pub fn store_fetches(&self) -> u64 {
        self.store_fetches.load(Ordering::Relaxed)
    }

    /// Returns the number of lifecycle hooks processed.
    pub fn write_throughs(&self) -> u64 {
        self.write_throughs.load(Ordering::Relaxed)
    }

    /// Returns the number of entries deleted by write-through.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Returns the number of reads degraded by cache failures.
    pub fn degraded_reads(&self) -> u64 {
        self.degraded_reads.load(Ordering::Relaxed)
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.bypasses,
            &self.store_fetches,
            &self.write_throughs,
            &self.invalidations,
            &self.degraded_reads,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
