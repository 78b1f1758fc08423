//! # recache backend
//!
//! Backing cache trait and implementations for recache.
//!
//! This crate is the lowest layer of the cache engine. Backends are
//! **opaque byte stores** keyed by strings - they know nothing about
//! indexes, records or entry formats.
//!
//! ## Design Principles
//!
//! - Single-key `get`/`set`/`delete` are atomic
//! - `get_multi` is one round trip, whatever the number of keys
//! - Eviction is always allowed and always reads as a miss
//! - Must be `Send + Sync`; one backend is shared by every caller
//!
//! ## Available Backends
//!
//! - [`InMemoryCache`] - For tests and single-process use
//!
//! ## Example
//!
//! ```rust
//! use recache_backend::{CacheBackend, InMemoryCache};
//!
//! let cache = InMemoryCache::new();
//! cache.set("k", b"v", None).unwrap();
//! let found = cache.get_multi(&["k".to_string(), "x".to_string()]).unwrap();
//! assert_eq!(found.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;

pub use backend::CacheBackend;
pub use error::{BackendError, BackendResult};
pub use memory::{InMemoryCache, DEFAULT_MAX_KEY_LEN, DEFAULT_MAX_VALUE_LEN};
