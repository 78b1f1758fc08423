//! Small in-crate store used by the unit tests.

use crate::error::{CacheError, CacheResult};
use crate::predicate::normalize;
use crate::query::{Aggregate, Query};
use crate::record::{Cacheable, Record};
use crate::store::RecordStore;
use crate::types::RecordId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct VecStore {
    table: String,
    records: Mutex<Vec<Record>>,
    pub(crate) every_calls: AtomicUsize,
    pub(crate) count_calls: AtomicUsize,
    pub(crate) id_requests: Mutex<Vec<Vec<RecordId>>>,
}

impl VecStore {
    pub(crate) fn new(table: &str, records: Vec<Record>) -> Self {
        Self {
            table: table.to_string(),
            records: Mutex::new(records),
            every_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            id_requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn upsert(&self, record: Record) {
        let mut records = self.records.lock();
        records.retain(|r| r.id() != record.id());
        records.push(record);
    }

    pub(crate) fn delete(&self, id: RecordId) {
        self.records.lock().retain(|r| r.id() != Some(id));
    }

    pub(crate) fn every_calls(&self) -> usize {
        self.every_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn id_requests(&self) -> Vec<Vec<RecordId>> {
        self.id_requests.lock().clone()
    }

    fn matching(&self, query: &Query) -> CacheResult<Vec<Record>> {
        let filter = normalize(&query.filter, &self.table)
            .ok_or_else(|| CacheError::store("unsupported filter"))?;
        let scope = normalize(&query.scope, &self.table)
            .ok_or_else(|| CacheError::store("unsupported scope"))?;
        let predicate = filter.merge(scope);
        let mut found: Vec<Record> = self
            .records
            .lock()
            .iter()
            .filter(|r| predicate.matches(*r))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id());
        Ok(found)
    }
}

impl RecordStore for VecStore {
    type Record = Record;

    fn find_every(&self, query: &Query) -> CacheResult<Vec<Record>> {
        self.every_calls.fetch_add(1, Ordering::SeqCst);
        Ok(query.slice(self.matching(query)?))
    }

    fn find_by_ids(&self, query: &Query, ids: &[RecordId]) -> CacheResult<Vec<Record>> {
        self.id_requests.lock().push(ids.to_vec());
        let found = self.matching(query)?;
        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|r| r.id() == Some(*id)).cloned())
            .collect())
    }

    fn calculate(&self, query: &Query, _aggregate: &Aggregate) -> CacheResult<i64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching(query)?.len() as i64)
    }
}
