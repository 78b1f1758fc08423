//! Two-level query dispatcher.
//!
//! [`CachedStore`] wraps a [`RecordStore`] and answers the queries it can
//! prove cacheable from the cache:
//!
//! 1. the filter and scope are normalized into an equality predicate
//! 2. the predicate's attribute set must match one of the type's indexes
//! 3. the index-level entry (an identifier list) is read or populated
//! 4. the identifiers are hydrated through one batched identifier-level read
//!
//! Everything else goes straight to the wrapped store.

use crate::entry::CacheEntry;
use crate::error::CacheResult;
use crate::key::{build_key, count_key, id_key};
use crate::predicate::{normalize, Predicate};
use crate::query::{Aggregate, Query};
use crate::record::Cacheable;
use crate::registry::{CacheRegistry, CachedType, Index};
use crate::resolver::{Fetched, TypeCache};
use crate::stats::CacheStats;
use crate::store::RecordStore;
use crate::types::RecordId;
use recache_backend::CacheBackend;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Why a query was sent to the store without consulting the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// The type has no cache configuration.
    UnknownModel,
    /// The query carries options other than limit and offset.
    UnsafeOptions,
    /// The filter or scope is not a conjunction of equalities.
    NotNormalizable,
    /// No index has exactly the predicate's attribute set.
    NotIndexed,
    /// The aggregate is not a plain count.
    UnsupportedAggregate,
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            BypassReason::UnknownModel => "unknown model",
            BypassReason::UnsafeOptions => "unsafe options",
            BypassReason::NotNormalizable => "not normalizable",
            BypassReason::NotIndexed => "not indexed",
            BypassReason::UnsupportedAggregate => "unsupported aggregate",
        };
        f.write_str(reason)
    }
}

/// How a query will be answered.
#[derive(Debug, Clone)]
pub enum Plan<'a> {
    /// From the cache, through `index` at `key`.
    Cached {
        /// The queried type.
        ty: &'a CachedType,
        /// The matching index.
        index: &'a Index,
        /// Index-level key of the query.
        key: String,
    },
    /// Straight from the store.
    Bypass(BypassReason),
}

impl Plan<'_> {
    /// Returns true if the query is answered from the cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, Plan::Cached { .. })
    }

    /// Returns the index-level key of a cached plan.
    pub fn key(&self) -> Option<&str> {
        match self {
            Plan::Cached { key, .. } => Some(key),
            Plan::Bypass(_) => None,
        }
    }
}

/// A record store with a transparent write-through cache in front of it.
///
/// Reads go through the cache when cacheable. Writes are reported through
/// [`WriteThrough`](crate::WriteThrough) so cached entries stay current.
pub struct CachedStore<S, C> {
    store: S,
    cache: C,
    registry: Arc<CacheRegistry>,
    stats: CacheStats,
}

impl<S, C> CachedStore<S, C>
where
    S: RecordStore,
    C: CacheBackend,
{
    /// Wraps `store` with `cache`, configured by `registry`.
    pub fn new(store: S, cache: C, registry: Arc<CacheRegistry>) -> Self {
        Self {
            store,
            cache,
            registry,
            stats: CacheStats::new(),
        }
    }

    /// Returns the wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the cache backend.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the registry.
    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Returns the statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Decides how `query` is answered.
    pub fn plan(&self, query: &Query) -> Plan<'_> {
        let Some(ty) = self.registry.get(&query.model) else {
            return Plan::Bypass(BypassReason::UnknownModel);
        };
        if !query.has_only_cacheable_options() {
            return Plan::Bypass(BypassReason::UnsafeOptions);
        }
        let Some(predicate) = merged_predicate(query, ty) else {
            return Plan::Bypass(BypassReason::NotNormalizable);
        };
        let names = predicate.names();
        match ty.index_for(&names) {
            Some(index) => Plan::Cached {
                ty,
                index,
                key: build_key(predicate.pairs()),
            },
            None => Plan::Bypass(BypassReason::NotIndexed),
        }
    }

    pub(crate) fn type_cache<'a>(&'a self, ty: &'a CachedType) -> TypeCache<'a, C> {
        TypeCache::new(&self.cache, ty, &self.stats)
    }

    fn bypass(&self, query: &Query, reason: BypassReason) {
        debug!(model = %query.model, %reason, "cache bypass");
        self.stats.record_bypass();
    }

    /// Returns every record behind an index-level key, ascending by id.
    fn find_through_index(
        &self,
        ty: &CachedType,
        index: &Index,
        key: String,
        query: &Query,
    ) -> CacheResult<Vec<S::Record>> {
        let cache = self.type_cache(ty);
        let mut fetched: Option<Vec<S::Record>> = None;
        let mut entries = cache.get_or_fetch(std::slice::from_ref(&key), index.ttl(), |missing| {
            let mut records = self.store.find_every(&query.unbounded())?;
            records.sort_by_key(|record| record.id());
            let entry = if index.is_primary() {
                CacheEntry::from_record(records.first().cloned())
            } else {
                CacheEntry::ids_of(&records)
            };
            fetched = Some(records);
            Ok(Fetched::Keyed(
                missing.iter().map(|k| (k.clone(), entry.clone())).collect(),
            ))
        })?;

        if let Some(records) = fetched {
            if !index.is_primary() {
                self.populate_records(&cache, ty, &records);
            }
            return Ok(records);
        }
        match entries.remove(&key) {
            Some(CacheEntry::Record(record)) => Ok(vec![record]),
            Some(CacheEntry::Ids(ids)) => self.hydrate(ty, &query.model, &ids),
            Some(CacheEntry::NotFound) | None => Ok(Vec::new()),
        }
    }

    /// Seeds the identifier level with records a list miss already fetched.
    fn populate_records(&self, cache: &TypeCache<'_, C>, ty: &CachedType, records: &[S::Record]) {
        let ttl = ty.primary_index().ttl();
        for record in records {
            let Some(id) = record.id() else { continue };
            let key = id_key(id);
            if let Err(error) = cache.write(&key, &CacheEntry::Record(record.clone()), ttl) {
                warn!(model = ty.name(), key = %key, %error, "cache populate failed");
                return;
            }
        }
    }

    /// Loads records by identifier through the identifier-level cache,
    /// preserving the order of `ids`. Absent records are skipped.
    fn hydrate(
        &self,
        ty: &CachedType,
        model: &str,
        ids: &[RecordId],
    ) -> CacheResult<Vec<S::Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| id_key(*id)).collect();
        let by_key: HashMap<&str, RecordId> =
            keys.iter().map(String::as_str).zip(ids.iter().copied()).collect();

        let cache = self.type_cache(ty);
        let mut entries = cache.get_or_fetch(&keys, ty.primary_index().ttl(), |missing| {
            let wanted: Vec<RecordId> = missing
                .iter()
                .filter_map(|k| by_key.get(k.as_str()).copied())
                .collect();
            trace!(model, ids = ?wanted, "fetching missing records");
            let records = self.store.find_by_ids(&Query::new(model), &wanted)?;
            Ok(Fetched::Records(records))
        })?;

        Ok(keys
            .iter()
            .filter_map(|k| match entries.remove(k) {
                Some(CacheEntry::Record(record)) => Some(record),
                _ => None,
            })
            .collect())
    }

    /// Identifier lookups are cached only when nothing but the identifiers
    /// constrains the result.
    fn id_lookup_type(&self, query: &Query) -> Result<&CachedType, BypassReason> {
        let ty = self
            .registry
            .get(&query.model)
            .ok_or(BypassReason::UnknownModel)?;
        if !query.has_only_cacheable_options() || query.limit.is_some() || query.offset.is_some() {
            return Err(BypassReason::UnsafeOptions);
        }
        match merged_predicate(query, ty) {
            Some(predicate) if predicate.is_empty() => Ok(ty),
            Some(_) => Err(BypassReason::NotIndexed),
            None => Err(BypassReason::NotNormalizable),
        }
    }
}

fn merged_predicate(query: &Query, ty: &CachedType) -> Option<Predicate> {
    let filter = normalize(&query.filter, ty.table())?;
    let scope = normalize(&query.scope, ty.table())?;
    Some(filter.merge(scope).sorted())
}

impl<S, C> RecordStore for CachedStore<S, C>
where
    S: RecordStore,
    C: CacheBackend,
{
    type Record = S::Record;

    fn find_every(&self, query: &Query) -> CacheResult<Vec<Self::Record>> {
        match self.plan(query) {
            Plan::Cached { ty, index, key } => {
                trace!(model = %query.model, key = %key, "cached find_every");
                let records = self.find_through_index(ty, index, key, query)?;
                Ok(query.slice(records))
            }
            Plan::Bypass(reason) => {
                self.bypass(query, reason);
                self.store.find_every(query)
            }
        }
    }

    fn find_first(&self, query: &Query) -> CacheResult<Option<Self::Record>> {
        match self.plan(query) {
            Plan::Cached { ty, index, key } => {
                trace!(model = %query.model, key = %key, "cached find_first");
                let records = self.find_through_index(ty, index, key, query)?;
                Ok(records.into_iter().nth(query.offset.unwrap_or(0)))
            }
            Plan::Bypass(reason) => {
                self.bypass(query, reason);
                self.store.find_first(query)
            }
        }
    }

    fn find_by_ids(&self, query: &Query, ids: &[RecordId]) -> CacheResult<Vec<Self::Record>> {
        match self.id_lookup_type(query) {
            Ok(ty) => {
                trace!(model = %query.model, count = ids.len(), "cached find_by_ids");
                self.hydrate(ty, &query.model, ids)
            }
            Err(reason) => {
                self.bypass(query, reason);
                self.store.find_by_ids(query, ids)
            }
        }
    }

    fn calculate(&self, query: &Query, aggregate: &Aggregate) -> CacheResult<i64> {
        if *aggregate != Aggregate::CountAll {
            self.bypass(query, BypassReason::UnsupportedAggregate);
            return self.store.calculate(query, aggregate);
        }
        let (ty, index, key) = match self.plan(query) {
            Plan::Cached { ty, index, key } => (ty, index, count_key(&key)),
            Plan::Bypass(reason) => {
                self.bypass(query, reason);
                return self.store.calculate(query, aggregate);
            }
        };

        let cache = self.type_cache(ty);
        match cache.read_count(&key) {
            Ok(Some(count)) => {
                self.stats.record_hits(1);
                return Ok(count);
            }
            Ok(None) => self.stats.record_misses(1),
            Err(error) => {
                warn!(
                    model = %query.model,
                    key = %key,
                    %error,
                    "cache read failed, falling back to store"
                );
                self.stats.record_degraded_read();
            }
        }

        self.stats.record_store_fetch();
        let count = self.store.calculate(query, aggregate)?;
        if let Err(error) = cache.write_count(&key, count, index.ttl()) {
            warn!(model = %query.model, key = %key, %error, "cache populate failed");
        }
        Ok(count)
    }
}

impl<S: fmt::Debug, C> fmt::Debug for CachedStore<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedStore")
            .field("store", &self.store)
            .field("types", &self.registry.len())
            .finish_non_exhaustive()
    }
}
