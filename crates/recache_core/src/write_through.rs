//! Write-through index maintenance.
//!
//! Every lifecycle event is replayed for the record's type and for each
//! ancestor sharing its table, so entries cached under any of those types
//! stay current.

use crate::cached_store::CachedStore;
use crate::entry::CacheEntry;
use crate::error::CacheResult;
use crate::key::count_key;
use crate::record::Cacheable;
use crate::registry::Index;
use crate::resolver::TypeCache;
use crate::store::RecordStore;
use crate::types::RecordId;
use recache_backend::CacheBackend;
use tracing::debug;

/// Lifecycle hooks the host calls after a record changes in the store.
///
/// Backend failures are returned to the caller: a write that could not be
/// reflected in the cache leaves stale entries behind.
pub trait WriteThrough<R> {
    /// A record was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be updated.
    fn on_created(&self, record: &R) -> CacheResult<()>;

    /// A record was updated. Pending changes on `record` identify the
    /// entries it used to belong to.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be updated.
    fn on_updated(&self, record: &R) -> CacheResult<()>;

    /// A record was deleted. A record that was never persisted is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be updated.
    fn on_removed(&self, record: &R) -> CacheResult<()>;

    /// Drops every entry the record belongs to, without touching the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be updated.
    fn on_expire_requested(&self, record: &R) -> CacheResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Created,
    Updated,
    Removed,
    Expired,
}

impl Event {
    fn as_str(self) -> &'static str {
        match self {
            Event::Created => "created",
            Event::Updated => "updated",
            Event::Removed => "removed",
            Event::Expired => "expired",
        }
    }
}

impl<S, C> CachedStore<S, C>
where
    S: RecordStore,
    C: CacheBackend,
{
    fn replay(&self, record: &S::Record, event: Event) -> CacheResult<()> {
        let chain = self.registry().write_chain(record.type_name());
        if chain.is_empty() {
            debug!(
                model = record.type_name(),
                event = event.as_str(),
                "write-through on uncached type"
            );
            return Ok(());
        }
        self.stats().record_write_through();
        for ty in chain {
            debug!(
                model = ty.name(),
                event = event.as_str(),
                id = ?record.id(),
                "write-through"
            );
            let cache = self.type_cache(ty);
            for index in ty.indexes() {
                match event {
                    Event::Created => created(&cache, index, record)?,
                    Event::Updated => updated(&cache, index, record)?,
                    Event::Removed | Event::Expired => invalidate(&cache, index, record)?,
                }
            }
        }
        Ok(())
    }
}

fn created<C, R>(cache: &TypeCache<'_, C>, index: &Index, record: &R) -> CacheResult<()>
where
    C: CacheBackend + ?Sized,
    R: Cacheable,
{
    let Some(id) = record.id() else {
        return Ok(());
    };
    let key = index.key_for(record);
    if index.is_primary() {
        cache.write(&key, &CacheEntry::Record(record.clone()), index.ttl())?;
    } else {
        add_member::<C, R>(cache, index, &key, id)?;
    }
    cache.delete(&count_key(&key))
}

fn updated<C, R>(cache: &TypeCache<'_, C>, index: &Index, record: &R) -> CacheResult<()>
where
    C: CacheBackend + ?Sized,
    R: Cacheable,
{
    let Some(id) = record.id() else {
        return Ok(());
    };
    let key = index.key_for(record);
    let previous = index.previous_key_for(record);

    if index.is_primary() {
        if previous != key {
            cache.delete(&previous)?;
        }
        return cache.write(&key, &CacheEntry::Record(record.clone()), index.ttl());
    }
    if previous == key {
        return Ok(());
    }
    cache.delete(&previous)?;
    cache.delete(&count_key(&previous))?;
    add_member::<C, R>(cache, index, &key, id)?;
    cache.delete(&count_key(&key))
}

fn invalidate<C, R>(cache: &TypeCache<'_, C>, index: &Index, record: &R) -> CacheResult<()>
where
    C: CacheBackend + ?Sized,
    R: Cacheable,
{
    let key = index.key_for(record);
    cache.delete(&key)?;
    cache.delete(&count_key(&key))?;
    let previous = index.previous_key_for(record);
    if previous != key {
        cache.delete(&previous)?;
        cache.delete(&count_key(&previous))?;
    }
    Ok(())
}

/// Adds `id` to a cached identifier list. An absent list stays absent; an
/// entry of the wrong shape is dropped.
fn add_member<C, R>(
    cache: &TypeCache<'_, C>,
    index: &Index,
    key: &str,
    id: RecordId,
) -> CacheResult<()>
where
    C: CacheBackend + ?Sized,
    R: Cacheable,
{
    match cache.read::<R>(key)? {
        Some(CacheEntry::Ids(mut ids)) => {
            if let Err(at) = ids.binary_search(&id) {
                ids.insert(at, id);
                cache.write(key, &CacheEntry::<R>::Ids(ids), index.ttl())?;
            }
            Ok(())
        }
        Some(_) => cache.delete(key),
        None => Ok(()),
    }
}

impl<S, C> WriteThrough<S::Record> for CachedStore<S, C>
where
    S: RecordStore,
    C: CacheBackend,
{
    fn on_created(&self, record: &S::Record) -> CacheResult<()> {
        self.replay(record, Event::Created)
    }

    fn on_updated(&self, record: &S::Record) -> CacheResult<()> {
        self.replay(record, Event::Updated)
    }

    fn on_removed(&self, record: &S::Record) -> CacheResult<()> {
        if record.id().is_none() {
            return Ok(());
        }
        self.replay(record, Event::Removed)
    }

    fn on_expire_requested(&self, record: &S::Record) -> CacheResult<()> {
        self.replay(record, Event::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, TypeConfig};
    use crate::predicate::Filter;
    use crate::query::Query;
    use crate::record::Record;
    use crate::registry::CacheRegistry;
    use crate::test_support::VecStore;
    use recache_backend::InMemoryCache;
    use std::sync::Arc;

    fn cached(records: Vec<Record>) -> CachedStore<VecStore, InMemoryCache> {
        let config = CacheConfig::new().with_type(
            TypeConfig::new("User")
                .table("users")
                .index_on(["status"])
                .index_on(Vec::<String>::new()),
        );
        CachedStore::new(
            VecStore::new("users", records),
            InMemoryCache::new(),
            Arc::new(CacheRegistry::new(config).unwrap()),
        )
    }

    fn user(id: i64, status: &str) -> Record {
        Record::new("User").with_id(id).with("status", status)
    }

    fn by_status(status: &str) -> Query {
        Query::new("User").filter(Filter::map([("status", status)]))
    }

    #[test]
    fn create_appends_to_cached_list_and_drops_count() {
        let cached = cached(vec![user(1, "active"), user(5, "active")]);
        cached.find_every(&by_status("active")).unwrap();
        cached
            .calculate(&Query::new("User"), &crate::Aggregate::CountAll)
            .unwrap();
        assert!(cached.cache().contains("User:1/count"));

        let created = user(3, "active");
        cached.store().upsert(created.clone());
        cached.on_created(&created).unwrap();

        assert_eq!(
            cached.type_cache(cached.registry().get("User").unwrap())
                .read::<Record>("status/active")
                .unwrap(),
            Some(CacheEntry::Ids(vec![RecordId(1), RecordId(3), RecordId(5)]))
        );
        assert!(!cached.cache().contains("User:1/count"));
        assert!(cached.cache().contains("User:1/id/3"));

        let users = cached.find_every(&by_status("active")).unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(cached.store().every_calls(), 1);
    }

    #[test]
    fn create_leaves_absent_lists_absent() {
        let cached = cached(Vec::new());
        cached.on_created(&user(1, "active")).unwrap();
        assert!(!cached.cache().contains("User:1/status/active"));
        assert!(cached.cache().contains("User:1/id/1"));
    }

    #[test]
    fn create_twice_does_not_duplicate() {
        let cached = cached(vec![user(1, "active")]);
        cached.find_every(&by_status("active")).unwrap();
        cached.on_created(&user(1, "active")).unwrap();
        let users = cached.find_every(&by_status("active")).unwrap();
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn update_moves_record_between_lists() {
        let mut moved = user(1, "active");
        let cached = cached(vec![moved.clone(), user(2, "banned")]);
        cached.find_every(&by_status("active")).unwrap();
        cached.find_every(&by_status("banned")).unwrap();

        moved.set("status", "banned");
        cached.store().upsert(moved.clone());
        cached.on_updated(&moved).unwrap();
        moved.mark_persisted();

        assert!(cached.find_every(&by_status("active")).unwrap().is_empty());
        let banned = cached.find_every(&by_status("banned")).unwrap();
        assert_eq!(banned, vec![moved, user(2, "banned")]);
    }

    #[test]
    fn update_refreshes_identifier_entry() {
        let mut renamed = user(1, "active").with("name", "old");
        let cached = cached(vec![renamed.clone()]);
        cached.find_every(&by_status("active")).unwrap();

        renamed.set("name", "new");
        cached.store().upsert(renamed.clone());
        cached.on_updated(&renamed).unwrap();

        let users = cached.find_every(&by_status("active")).unwrap();
        assert_eq!(users[0].get("name"), Some(&crate::Value::from("new")));
        assert_eq!(cached.store().every_calls(), 1);
    }

    #[test]
    fn remove_invalidates_lists_and_record() {
        let gone = user(1, "active");
        let cached = cached(vec![gone.clone(), user(2, "active")]);
        cached.find_every(&by_status("active")).unwrap();

        cached.store().delete(RecordId(1));
        cached.on_removed(&gone).unwrap();

        assert!(!cached.cache().contains("User:1/status/active"));
        assert!(!cached.cache().contains("User:1/id/1"));
        assert_eq!(cached.find_every(&by_status("active")).unwrap().len(), 1);
    }

    #[test]
    fn remove_of_unsaved_record_is_a_no_op() {
        let cached = cached(vec![user(1, "active")]);
        cached.find_every(&by_status("active")).unwrap();
        let before = cached.cache().keys();

        cached
            .on_removed(&Record::new("User").with("status", "active"))
            .unwrap();
        assert_eq!(cached.cache().keys(), before);
    }

    #[test]
    fn remove_is_idempotent() {
        let gone = user(1, "active");
        let cached = cached(vec![gone.clone()]);
        cached.find_every(&by_status("active")).unwrap();

        cached.on_removed(&gone).unwrap();
        let after_once = cached.cache().keys();
        cached.on_removed(&gone).unwrap();
        assert_eq!(cached.cache().keys(), after_once);
    }

    #[test]
    fn expire_drops_entries_without_store_changes() {
        let kept = user(1, "active");
        let cached = cached(vec![kept.clone()]);
        cached.find_every(&by_status("active")).unwrap();

        cached.on_expire_requested(&kept).unwrap();
        assert!(cached.cache().is_empty());
        assert_eq!(cached.find_every(&by_status("active")).unwrap(), vec![kept]);
        assert_eq!(cached.store().every_calls(), 2);
    }

    #[test]
    fn uncached_types_are_ignored() {
        let cached = cached(Vec::new());
        cached.on_created(&Record::new("Order").with_id(1)).unwrap();
        assert!(cached.cache().is_empty());
        assert_eq!(cached.stats().write_throughs(), 0);
    }
}
