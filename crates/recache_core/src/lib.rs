//! # recache core
//!
//! Transparent write-through query cache for record stores.
//!
//! This crate provides:
//! - Predicate normalization of equality filters
//! - An index registry with shared-table type hierarchies
//! - Deterministic cache keys
//! - A two-level cache: index key to identifiers, identifier key to record
//! - Batched miss resolution against the store
//! - Write-through maintenance of cached entries
//!
//! ## Example
//!
//! ```rust,ignore
//! use recache_core::{
//!     CacheConfig, CacheRegistry, CachedStore, Filter, Query, RecordStore, TypeConfig,
//! };
//! use recache_backend::InMemoryCache;
//! use std::sync::Arc;
//!
//! let config = CacheConfig::new().with_type(TypeConfig::new("User").index_on(["email"]));
//! let registry = Arc::new(CacheRegistry::new(config)?);
//! let cached = CachedStore::new(store, InMemoryCache::new(), registry);
//!
//! let query = Query::new("User").filter(Filter::map([("email", "a@x.com")]));
//! let users = cached.find_every(&query)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cached_store;
mod config;
mod entry;
mod error;
mod key;
mod predicate;
mod query;
mod record;
mod registry;
mod resolver;
mod stats;
mod store;
mod types;
mod value;
mod write_through;

#[cfg(test)]
mod test_support;

pub use cached_store::{BypassReason, CachedStore, Plan};
pub use config::{CacheConfig, IndexSpec, TypeConfig, DEFAULT_TTL};
pub use entry::{decode, decode_count, encode, encode_count, CacheEntry};
pub use error::{CacheError, CacheResult, StoreFailure};
pub use key::{build_key, count_key, id_key, KeySpace, COUNT_SUFFIX, DELIMITER};
pub use predicate::{normalize, Filter, Predicate};
pub use query::{Aggregate, Found, IdLookup, Query};
pub use record::{Cacheable, Record, PRIMARY_KEY};
pub use registry::{CacheRegistry, CachedType, Index};
pub use resolver::{Fetched, TypeCache};
pub use stats::CacheStats;
pub use store::RecordStore;
pub use types::RecordId;
pub use value::Value;
pub use write_through::WriteThrough;

// Re-export the backend layer for convenience
pub use recache_backend::{BackendError, BackendResult, CacheBackend, InMemoryCache};
