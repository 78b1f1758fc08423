//! Batched miss resolution over a type's key space.

use crate::entry::{decode, decode_count, encode, encode_count, CacheEntry};
use crate::error::CacheResult;
use crate::key::id_key;
use crate::record::Cacheable;
use crate::registry::CachedType;
use crate::stats::CacheStats;
use recache_backend::CacheBackend;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{trace, warn};

/// What a miss handler hands back.
#[derive(Debug, Clone)]
pub enum Fetched<R> {
    /// Entries keyed by the missing keys they answer.
    Keyed(HashMap<String, CacheEntry<R>>),
    /// Records fetched by identifier. Each lands at its own identifier key;
    /// missing identifier keys with no record become `NotFound`.
    Records(Vec<R>),
}

/// A view of the backing cache restricted to one type's key space.
///
/// Keys passed in and out are unqualified index keys; qualification with
/// the type's [`KeySpace`](crate::KeySpace) happens here.
pub struct TypeCache<'a, C: ?Sized> {
    backend: &'a C,
    ty: &'a CachedType,
    stats: &'a CacheStats,
}

impl<'a, C: CacheBackend + ?Sized> TypeCache<'a, C> {
    /// Creates a view for `ty`.
    pub fn new(backend: &'a C, ty: &'a CachedType, stats: &'a CacheStats) -> Self {
        Self { backend, ty, stats }
    }

    /// Returns the entries for `keys`, resolving every absent key with a
    /// single call to `on_miss`.
    ///
    /// Exactly one multi-get is issued. If it fails the read degrades:
    /// every key is treated as missing. Entries produced by `on_miss` are
    /// written back before returning; failing write-backs are logged, since
    /// the answer itself is still correct.
    ///
    /// # Errors
    ///
    /// Propagates the error of `on_miss`.
    pub fn get_or_fetch<R, F>(
        &self,
        keys: &[String],
        ttl: Duration,
        on_miss: F,
    ) -> CacheResult<HashMap<String, CacheEntry<R>>>
    where
        R: Cacheable,
        F: FnOnce(&[String]) -> CacheResult<Fetched<R>>,
    {
        let qualified: Vec<String> = keys.iter().map(|k| self.qualify(k)).collect();
        let mut raw = match self.backend.get_multi(&qualified) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(model = self.ty.name(), %error, "cache read failed, falling back to store");
                self.stats.record_degraded_read();
                HashMap::new()
            }
        };

        let mut entries = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        for (key, qualified_key) in keys.iter().zip(&qualified) {
            let decoded = raw.remove(qualified_key).and_then(|bytes| {
                decode::<R>(&bytes)
                    .map_err(|error| {
                        warn!(
                            key = %qualified_key,
                            %error,
                            "undecodable cache entry treated as miss"
                        );
                    })
                    .ok()
            });
            match decoded {
                Some(entry) => {
                    trace!(key = %qualified_key, "cache hit");
                    entries.insert(key.clone(), entry);
                }
                None if !missing.contains(key) => missing.push(key.clone()),
                None => {}
            }
        }
        self.stats.record_hits(entries.len());
        self.stats.record_misses(missing.len());

        if missing.is_empty() {
            return Ok(entries);
        }

        trace!(model = self.ty.name(), count = missing.len(), "resolving cache misses");
        self.stats.record_store_fetch();
        let fetched = match on_miss(&missing)? {
            Fetched::Keyed(map) => map,
            Fetched::Records(records) => correspond_by_id(&missing, records),
        };

        for (key, entry) in fetched {
            if let Err(error) = self.write(&key, &entry, ttl) {
                warn!(model = self.ty.name(), key = %key, %error, "cache populate failed");
            }
            entries.insert(key, entry);
        }
        Ok(entries)
    }

    /// Reads one entry. An undecodable entry reads as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn read<R: Cacheable>(&self, key: &str) -> CacheResult<Option<CacheEntry<R>>> {
        let qualified = self.qualify(key);
        let Some(bytes) = self.backend.get(&qualified)? else {
            return Ok(None);
        };
        match decode(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(error) => {
                warn!(key = %qualified, %error, "undecodable cache entry treated as miss");
                Ok(None)
            }
        }
    }

    /// Writes one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend fails.
    pub fn write<R: Cacheable>(
        &self,
        key: &str,
        entry: &CacheEntry<R>,
        ttl: Duration,
    ) -> CacheResult<()> {
        let bytes = encode(entry)?;
        self.backend.set(&self.qualify(key), &bytes, Some(ttl))?;
        Ok(())
    }

    /// Deletes one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn delete(&self, key: &str) -> CacheResult<()> {
        self.backend.delete(&self.qualify(key))?;
        self.stats.record_invalidation();
        Ok(())
    }

    /// Reads a raw count. A non-numeric value reads as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn read_count(&self, key: &str) -> CacheResult<Option<i64>> {
        Ok(self
            .backend
            .get(&self.qualify(key))?
            .and_then(|bytes| decode_count(&bytes)))
    }

    /// Writes a raw count.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn write_count(&self, key: &str, count: i64, ttl: Duration) -> CacheResult<()> {
        self.backend
            .set(&self.qualify(key), &encode_count(count), Some(ttl))?;
        Ok(())
    }

    fn qualify(&self, key: &str) -> String {
        self.ty.key_space().qualify(key)
    }
}

fn correspond_by_id<R: Cacheable>(
    missing: &[String],
    records: Vec<R>,
) -> HashMap<String, CacheEntry<R>> {
    let wanted: HashSet<&String> = missing.iter().collect();
    let mut out = HashMap::with_capacity(missing.len());
    for record in records {
        let Some(id) = record.id() else { continue };
        let key = id_key(id);
        if wanted.contains(&key) {
            out.insert(key, CacheEntry::Record(record));
        }
    }
    for key in missing {
        out.entry(key.clone()).or_insert(CacheEntry::NotFound);
    }
    out
}
