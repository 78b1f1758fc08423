//! Record store abstraction.

use crate::error::{CacheError, CacheResult};
use crate::query::{Aggregate, Found, IdLookup, Query};
use crate::record::Cacheable;
use crate::types::RecordId;
use std::sync::Arc;

/// A store that answers queries for records.
///
/// The plain implementation talks to the database. [`crate::CachedStore`]
/// implements the same trait by wrapping a plain store, so callers pick
/// caching at construction time and never see the difference.
///
/// Failures of a database-backed store are reported as
/// [`CacheError::Store`].
pub trait RecordStore: Send + Sync {
    /// Record type produced by this store.
    type Record: Cacheable;

    /// Returns all records matching the query, honouring limit and offset.
    fn find_every(&self, query: &Query) -> CacheResult<Vec<Self::Record>>;

    /// Returns the first record matching the query.
    fn find_first(&self, query: &Query) -> CacheResult<Option<Self::Record>> {
        let mut first = query.clone();
        first.limit = Some(1);
        Ok(self.find_every(&first)?.into_iter().next())
    }

    /// Returns the records with the given identifiers that also satisfy the
    /// query's filters. Missing identifiers are skipped.
    fn find_by_ids(&self, query: &Query, ids: &[RecordId]) -> CacheResult<Vec<Self::Record>>;

    /// Computes an aggregate over the records matching the query.
    fn calculate(&self, query: &Query, aggregate: &Aggregate) -> CacheResult<i64>;

    /// Looks records up by identifier, shaping the result as the caller
    /// expects.
    ///
    /// - no identifiers and a list expected: empty list
    /// - no identifiers otherwise, or no record found: `RecordNotFound`
    /// - one record and no list expected: the record itself
    /// - otherwise: the list
    fn find(&self, query: &Query, lookup: &IdLookup) -> CacheResult<Found<Self::Record>> {
        let ids = lookup.ids();
        if ids.is_empty() {
            return if lookup.expects_collection() {
                Ok(Found::Many(Vec::new()))
            } else {
                Err(CacheError::record_not_found(&query.model, ids))
            };
        }
        let records = self.find_by_ids(query, &ids)?;
        shape_found(&query.model, lookup, ids, records)
    }
}

fn shape_found<R>(
    model: &str,
    lookup: &IdLookup,
    ids: Vec<RecordId>,
    mut records: Vec<R>,
) -> CacheResult<Found<R>> {
    match records.len() {
        0 => Err(CacheError::record_not_found(model, ids)),
        1 if !lookup.expects_collection() => Ok(Found::One(records.remove(0))),
        _ => Ok(Found::Many(records)),
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    type Record = S::Record;

    fn find_every(&self, query: &Query) -> CacheResult<Vec<Self::Record>> {
        (**self).find_every(query)
    }

    fn find_first(&self, query: &Query) -> CacheResult<Option<Self::Record>> {
        (**self).find_first(query)
    }

    fn find_by_ids(&self, query: &Query, ids: &[RecordId]) -> CacheResult<Vec<Self::Record>> {
        (**self).find_by_ids(query, ids)
    }

    fn calculate(&self, query: &Query, aggregate: &Aggregate) -> CacheResult<i64> {
        (**self).calculate(query, aggregate)
    }

    fn find(&self, query: &Query, lookup: &IdLookup) -> CacheResult<Found<Self::Record>> {
        (**self).find(query, lookup)
    }
}
