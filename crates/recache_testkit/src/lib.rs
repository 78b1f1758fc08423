//! # recache testkit
//!
//! Test utilities for recache.
//!
//! This crate provides:
//! - [`MemoryRecordStore`], a record store that counts the calls it receives
//! - [`FaultyCache`], a cache backend with switchable failures
//! - Fixtures for a small user hierarchy
//! - Property-based test generators using proptest
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recache_testkit::prelude::*;
//!
//! #[test]
//! fn cached_lookup() {
//!     let cached = cached_users();
//!     let users = cached.find_every(&by_email("ann@example.com")).unwrap();
//!     assert_eq!(cached.store().calls().find_every, 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::store::*;
    pub use recache_backend::{CacheBackend, InMemoryCache};
    pub use recache_core::{
        Aggregate, CacheRegistry, CachedStore, Cacheable, Filter, IdLookup, Query, Record,
        RecordId, RecordStore, Value, WriteThrough,
    };
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use store::*;
