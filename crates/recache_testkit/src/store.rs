//! In-memory record store.
//!
//! Evaluates equality filters the same way the cache normalizes them, so
//! cached and uncached answers can be compared directly. Every call is
//! counted and identifier fetches are logged with the ids requested.

use parking_lot::{Mutex, RwLock};
use recache_core::{
    normalize, Aggregate, CacheError, CacheResult, Cacheable, Predicate, Query, Record, RecordId,
    RecordStore, Value,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Snapshot of the calls a [`MemoryRecordStore`] received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    /// `find_every` and `find_first` calls.
    pub find_every: usize,
    /// `find_by_ids` calls.
    pub find_by_ids: usize,
    /// `calculate` calls.
    pub calculate: usize,
}

impl StoreCalls {
    /// Total number of calls.
    pub fn total(&self) -> usize {
        self.find_every + self.find_by_ids + self.calculate
    }
}

/// A single-table record store held in memory.
#[derive(Debug)]
pub struct MemoryRecordStore {
    table: String,
    rows: RwLock<BTreeMap<RecordId, Record>>,
    parents: HashMap<String, String>,
    next_id: AtomicI64,
    find_every: AtomicUsize,
    find_by_ids: AtomicUsize,
    calculate: AtomicUsize,
    requested: Mutex<Vec<Vec<RecordId>>>,
    failure: Mutex<Option<String>>,
}

impl MemoryRecordStore {
    /// Creates an empty store for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: RwLock::new(BTreeMap::new()),
            parents: HashMap::new(),
            next_id: AtomicI64::new(1),
            find_every: AtomicUsize::new(0),
            find_by_ids: AtomicUsize::new(0),
            calculate: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Declares `child` a subtype stored in the same table as `parent`.
    /// Queries on `parent` then also return `child` records.
    #[must_use]
    pub fn with_subtype(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.parents.insert(child.into(), parent.into());
        self
    }

    /// Inserts a record, assigning the next identifier if it has none.
    /// Returns the stored record.
    pub fn insert(&self, mut record: Record) -> Record {
        let id = match record.id() {
            Some(id) => {
                self.next_id.fetch_max(id.as_i64() + 1, Ordering::SeqCst);
                id
            }
            None => {
                let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst));
                record.assign_id(id);
                id
            }
        };
        record.mark_persisted();
        self.rows.write().insert(id, record.clone());
        record
    }

    /// Replaces the stored copy of `record`. Pending changes on `record`
    /// are kept so the caller can still report them.
    pub fn update(&self, record: &Record) {
        let Some(id) = record.id() else { return };
        let mut stored = record.clone();
        stored.mark_persisted();
        self.rows.write().insert(id, stored);
    }

    /// Deletes a record.
    pub fn remove(&self, id: RecordId) -> Option<Record> {
        self.rows.write().remove(&id)
    }

    /// Returns the stored record with `id`.
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.rows.read().get(&id).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Calls received so far.
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            find_every: self.find_every.load(Ordering::SeqCst),
            find_by_ids: self.find_by_ids.load(Ordering::SeqCst),
            calculate: self.calculate.load(Ordering::SeqCst),
        }
    }

    /// Identifier lists passed to `find_by_ids`, oldest first.
    pub fn requested_ids(&self) -> Vec<Vec<RecordId>> {
        self.requested.lock().clone()
    }

    /// Clears the call counters and the identifier log.
    pub fn reset_calls(&self) {
        self.find_every.store(0, Ordering::SeqCst);
        self.find_by_ids.store(0, Ordering::SeqCst);
        self.calculate.store(0, Ordering::SeqCst);
        self.requested.lock().clear();
    }

    /// Makes every following call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Stops failing.
    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    fn check_failure(&self) -> CacheResult<()> {
        match self.failure.lock().as_ref() {
            Some(message) => Err(CacheError::store(message.clone())),
            None => Ok(()),
        }
    }

    fn is_kind_of(&self, kind: &str, model: &str) -> bool {
        let mut current = kind;
        loop {
            if current == model {
                return true;
            }
            match self.parents.get(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn predicate(&self, query: &Query) -> CacheResult<Predicate> {
        let filter = normalize(&query.filter, &self.table);
        let scope = normalize(&query.scope, &self.table);
        match (filter, scope) {
            (Some(filter), Some(scope)) => Ok(filter.merge(scope)),
            _ => Err(CacheError::store(format!(
                "memory store only evaluates equality filters on {}",
                self.table
            ))),
        }
    }

    /// Matching records, ascending by identifier, before paging.
    fn matching(&self, query: &Query) -> CacheResult<Vec<Record>> {
        let predicate = self.predicate(query)?;
        Ok(self
            .rows
            .read()
            .values()
            .filter(|record| self.is_kind_of(record.kind(), &query.model))
            .filter(|record| predicate.matches(*record))
            .cloned()
            .collect())
    }
}

impl RecordStore for MemoryRecordStore {
    type Record = Record;

    fn find_every(&self, query: &Query) -> CacheResult<Vec<Record>> {
        self.find_every.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let mut records = self.matching(query)?;
        if let Some(order) = &query.order {
            sort_by_order(&mut records, order);
        }
        Ok(query.slice(records))
    }

    fn find_by_ids(&self, query: &Query, ids: &[RecordId]) -> CacheResult<Vec<Record>> {
        self.find_by_ids.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(ids.to_vec());
        self.check_failure()?;
        let found: HashMap<RecordId, Record> = self
            .matching(query)?
            .into_iter()
            .filter_map(|record| record.id().map(|id| (id, record)))
            .collect();
        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    fn calculate(&self, query: &Query, aggregate: &Aggregate) -> CacheResult<i64> {
        self.calculate.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let records = self.matching(query)?;
        let integers = |column: &str| -> Vec<i64> {
            records
                .iter()
                .filter_map(|r| r.attribute(column).and_then(|v| v.as_integer()))
                .collect()
        };
        Ok(match aggregate {
            Aggregate::CountAll => records.len() as i64,
            Aggregate::Count(column) => records
                .iter()
                .filter(|r| !r.attribute(column).unwrap_or(Value::Null).is_null())
                .count() as i64,
            Aggregate::Sum(column) => integers(column).into_iter().sum(),
            Aggregate::Min(column) => integers(column).into_iter().min().unwrap_or(0),
            Aggregate::Max(column) => integers(column).into_iter().max().unwrap_or(0),
        })
    }
}

// Accepts "<attribute> [ASC|DESC]". Anything else keeps identifier order.
fn sort_by_order(records: &mut [Record], order: &str) {
    let mut parts = order.split_whitespace();
    let Some(column) = parts.next() else { return };
    let descending = parts
        .next()
        .is_some_and(|direction| direction.eq_ignore_ascii_case("desc"));
    records.sort_by(|a, b| {
        let a = a.attribute(column).unwrap_or(Value::Null);
        let b = b.attribute(column).unwrap_or(Value::Null);
        match (a.as_integer(), b.as_integer()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.key_form().cmp(&b.key_form()),
        }
    });
    if descending {
        records.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recache_core::{Filter, IdLookup};

    fn store() -> MemoryRecordStore {
        let store = MemoryRecordStore::new("users").with_subtype("Admin", "User");
        store.insert(Record::new("User").with("status", "active").with("age", 30));
        store.insert(Record::new("User").with("status", "banned").with("age", 20));
        store.insert(Record::new("Admin").with("status", "active").with("age", 40));
        store
    }

    #[test]
    fn insert_assigns_identifiers() {
        let store = store();
        assert_eq!(store.len(), 3);
        let next = store.insert(Record::new("User"));
        assert_eq!(next.id(), Some(RecordId(4)));
        let explicit = store.insert(Record::new("User").with_id(10));
        assert_eq!(explicit.id(), Some(RecordId(10)));
        assert_eq!(store.insert(Record::new("User")).id(), Some(RecordId(11)));
    }

    #[test]
    fn filters_and_subtypes() {
        let store = store();
        let active = Query::new("User").filter(Filter::map([("status", "active")]));
        assert_eq!(store.find_every(&active).unwrap().len(), 2);

        let admins = Query::new("Admin").filter(Filter::text("users.status = 'active'"));
        assert_eq!(store.find_every(&admins).unwrap().len(), 1);
    }

    #[test]
    fn order_and_paging() {
        let store = store();
        let query = Query::new("User").order("age DESC").limit(2);
        let ages: Vec<_> = store
            .find_every(&query)
            .unwrap()
            .iter()
            .filter_map(|r| r.attribute("age"))
            .collect();
        assert_eq!(ages, vec![Value::from(40), Value::from(30)]);
    }

    #[test]
    fn aggregates() {
        let store = store();
        let all = Query::new("User");
        assert_eq!(store.calculate(&all, &Aggregate::CountAll).unwrap(), 3);
        assert_eq!(store.calculate(&all, &Aggregate::Sum("age".into())).unwrap(), 90);
        assert_eq!(store.calculate(&all, &Aggregate::Max("age".into())).unwrap(), 40);
        assert_eq!(store.calculate(&all, &Aggregate::Count("missing".into())).unwrap(), 0);
    }

    #[test]
    fn logs_requested_ids() {
        let store = store();
        let found = store
            .find(&Query::new("User"), &IdLookup::collection([3, 1, 9]))
            .unwrap()
            .into_vec();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id(), Some(RecordId(3)));
        assert_eq!(store.requested_ids(), vec![vec![RecordId(3), RecordId(1), RecordId(9)]]);
        assert_eq!(store.calls().find_by_ids, 1);
    }

    #[test]
    fn injected_failures() {
        let store = store();
        store.fail_with("connection lost");
        let err = store.find_every(&Query::new("User")).unwrap_err();
        assert!(err.to_string().contains("connection lost"));
        store.recover();
        assert!(store.find_every(&Query::new("User")).is_ok());
        assert_eq!(store.calls().find_every, 2);
    }
}
