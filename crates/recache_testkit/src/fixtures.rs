//! Fixtures for a small user hierarchy.
//!
//! `User` lives in the `users` table with a `type` discriminator.
//! `ActivatedUser` shares that table; `Post` is an unrelated type.

use crate::store::MemoryRecordStore;
use recache_backend::{CacheBackend, InMemoryCache};
use recache_core::{
    CacheConfig, CacheRegistry, CachedStore, Filter, IndexSpec, Query, Record, TypeConfig,
    Value,
};
use std::sync::Arc;
use std::time::Duration;

/// TTL of the `login` index in [`users_config`].
pub const LOGIN_TTL: Duration = Duration::from_secs(300);

/// Cache configuration used by the scenario tests.
pub fn users_config() -> CacheConfig {
    CacheConfig::new()
        .with_type(
            TypeConfig::new("User")
                .table("users")
                .discriminator("type")
                .index_on(["email"])
                .index_on(["status", "account_id"])
                .index_on(Vec::<String>::new()),
        )
        .with_type(
            TypeConfig::new("ActivatedUser")
                .inherits("User")
                .discriminator("type")
                .index(IndexSpec::new(["login"]).ttl(LOGIN_TTL)),
        )
        .with_type(TypeConfig::new("Post").table("posts").index_on(["author_id"]))
}

/// Registry built from [`users_config`].
pub fn users_registry() -> Arc<CacheRegistry> {
    Arc::new(CacheRegistry::new(users_config()).expect("fixture config is valid"))
}

/// An unsaved `User`.
pub fn user(email: &str, status: &str, account_id: i64) -> Record {
    Record::new("User")
        .with("type", "User")
        .with("email", email)
        .with("status", status)
        .with("account_id", account_id)
}

/// An unsaved `ActivatedUser`.
pub fn activated_user(email: &str, login: &str, account_id: i64) -> Record {
    Record::new("ActivatedUser")
        .with("type", "ActivatedUser")
        .with("email", email)
        .with("login", login)
        .with("status", "active")
        .with("account_id", account_id)
}

/// A `users` store seeded with five records:
///
/// | id | type          | email            | status  | account |
/// |----|---------------|------------------|---------|---------|
/// | 1  | User          | ann@example.com  | active  | 1       |
/// | 2  | User          | bob@example.com  | active  | 1       |
/// | 3  | User          | cy@example.com   | pending | 1       |
/// | 4  | ActivatedUser | dee@example.com  | active  | 2       |
/// | 5  | ActivatedUser | eve@example.com  | active  | 1       |
pub fn seeded_users() -> MemoryRecordStore {
    let store = MemoryRecordStore::new("users").with_subtype("ActivatedUser", "User");
    store.insert(user("ann@example.com", "active", 1));
    store.insert(user("bob@example.com", "active", 1));
    store.insert(user("cy@example.com", "pending", 1));
    store.insert(activated_user("dee@example.com", "dee", 2));
    store.insert(activated_user("eve@example.com", "eve", 1));
    store
}

/// A cached view of [`seeded_users`] over a fresh in-memory cache.
pub fn cached_users() -> CachedStore<MemoryRecordStore, InMemoryCache> {
    cached_users_with(InMemoryCache::new())
}

/// A cached view of [`seeded_users`] over `cache`.
pub fn cached_users_with<C: CacheBackend>(cache: C) -> CachedStore<MemoryRecordStore, C> {
    CachedStore::new(seeded_users(), cache, users_registry())
}

/// `User` query on one email.
pub fn by_email(email: &str) -> Query {
    Query::new("User").filter(Filter::map([("email", email)]))
}

/// `User` query on status and account.
pub fn by_status_and_account(status: &str, account_id: i64) -> Query {
    Query::new("User").filter(Filter::parameterized(
        "status = ? AND account_id = ?",
        [Value::from(status), Value::from(account_id)],
    ))
}
