//! Remote key/value store abstraction.
//!
//! The cache only needs a handful of primitives from its backing store.
//! [`RedisStore`] talks to Redis; [`MemoryStore`] keeps everything in
//! process and doubles as the fake backing store in tests.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::{create_pool, RedisStore};

use async_trait::async_trait;
use std::time::Duration;
use strata_core::StrataResult;

/// Primitives the cache needs from a remote key/value store.
///
/// Values are JSON strings so the trait stays dyn-compatible. Transport
/// and timeout errors count against the circuit breaker; a command the
/// store rejects comes back as [`StrataError::Cache`] and does not.
///
/// [`StrataError::Cache`]: strata_core::StrataError::Cache
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get a raw value. Returns `None` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> StrataResult<Option<String>>;

    /// Get a raw value together with its remaining lifetime in one round
    /// trip. The lifetime is `None` for a persistent key.
    async fn get_with_ttl(&self, key: &str) -> StrataResult<Option<(String, Option<Duration>)>>;

    /// Get several raw values, one slot per requested key.
    async fn mget(&self, keys: &[String]) -> StrataResult<Vec<Option<String>>>;

    /// Set a raw value with an expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()>;

    /// Set several raw values with the same expiry in one round trip.
    async fn mset_ex(&self, entries: &[(String, String)], ttl: Duration) -> StrataResult<()>;

    /// Delete keys. Returns the number of keys that existed.
    async fn del(&self, keys: &[String]) -> StrataResult<u64>;

    /// List keys matching a glob pattern. O(n) over the keyspace.
    async fn keys(&self, pattern: &str) -> StrataResult<Vec<String>>;

    /// Add a member to a set.
    async fn sadd(&self, key: &str, member: &str) -> StrataResult<()>;

    /// List the members of a set; empty if the set does not exist.
    async fn smembers(&self, key: &str) -> StrataResult<Vec<String>>;

    /// Set or refresh a key's expiry.
    async fn expire(&self, key: &str, ttl: Duration) -> StrataResult<()>;

    /// Liveness check.
    async fn ping(&self) -> StrataResult<()>;

    /// Remove every key in the current database.
    async fn flush_db(&self) -> StrataResult<()>;

    /// Release connections. Further calls may fail.
    async fn close(&self) {}
}
