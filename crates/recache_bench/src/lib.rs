//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use recache_backend::InMemoryCache;
use recache_core::{CachedStore, Filter, Query, Record, Value};
use recache_testkit::{users_registry, MemoryRecordStore};

/// Number of distinct accounts in [`user_store`].
pub const ACCOUNTS: i64 = 16;

/// A `users` store holding `count` users spread over [`ACCOUNTS`] accounts.
pub fn user_store(count: i64) -> MemoryRecordStore {
    let store = MemoryRecordStore::new("users").with_subtype("ActivatedUser", "User");
    for i in 0..count {
        store.insert(
            Record::new("User")
                .with("type", "User")
                .with("email", format!("user{i}@example.com"))
                .with("status", if i % 3 == 0 { "pending" } else { "active" })
                .with("account_id", i % ACCOUNTS),
        );
    }
    store
}

/// A cached view of [`user_store`].
pub fn cached_user_store(count: i64) -> CachedStore<MemoryRecordStore, InMemoryCache> {
    CachedStore::new(user_store(count), InMemoryCache::new(), users_registry())
}

/// Query for active users of one account.
pub fn active_in(account: i64) -> Query {
    Query::new("User").filter(Filter::parameterized(
        "users.status = ? AND users.account_id = ?",
        [Value::from("active"), Value::from(account)],
    ))
}
