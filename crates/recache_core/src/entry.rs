//! Cache entry format.
//!
//! Entries are stored as CBOR. The identifier index stores the record
//! itself; every other index stores the sorted identifiers of its members.
//! Counts are stored raw, as decimal text.

use crate::error::{CacheError, CacheResult};
use crate::record::Cacheable;
use crate::types::RecordId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A decoded cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEntry<R> {
    /// A full record (identifier keys).
    Record(R),
    /// Member identifiers, ascending (index keys).
    Ids(Vec<RecordId>),
    /// The store holds nothing for this key.
    NotFound,
}

impl<R: Cacheable> CacheEntry<R> {
    /// Builds an identifier-list entry from fetched records.
    pub fn ids_of(records: &[R]) -> Self {
        let mut ids: Vec<RecordId> = records.iter().filter_map(Cacheable::id).collect();
        ids.sort_unstable();
        ids.dedup();
        CacheEntry::Ids(ids)
    }

    /// Builds an identifier-key entry from an optional record.
    pub fn from_record(record: Option<R>) -> Self {
        record.map_or(CacheEntry::NotFound, CacheEntry::Record)
    }
}

/// Encodes an entry.
///
/// # Errors
///
/// Returns [`CacheError::Codec`] if the record cannot be serialized.
pub fn encode<R: Serialize>(entry: &CacheEntry<R>) -> CacheResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(entry, &mut bytes).map_err(|e| CacheError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes an entry.
///
/// # Errors
///
/// Returns [`CacheError::Codec`] if the bytes are not a valid entry.
pub fn decode<R: DeserializeOwned>(bytes: &[u8]) -> CacheResult<CacheEntry<R>> {
    ciborium::from_reader(bytes).map_err(|e| CacheError::codec(e.to_string()))
}

/// Encodes a count.
pub fn encode_count(count: i64) -> Vec<u8> {
    count.to_string().into_bytes()
}

/// Decodes a count, or `None` if the bytes are not a decimal integer.
pub fn decode_count(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}
