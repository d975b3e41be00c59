//! # Strata Cache
//!
//! A two-layer cache: a bounded in-process layer in front of a networked
//! key/value store reached through a circuit breaker.
//!
//! # Architecture
//!
//! ```text
//! get(key) ──► LocalCache ──hit──► return
//!                 │ miss
//!                 ▼
//!          CircuitBreaker ──open──► miss
//!                 │
//!                 ▼
//!            RemoteStore ──hit──► promote to local (short TTL) ──► return
//!                 │                    │
//!                 │ miss               └─ TTL nearly spent? ──► WarmupQueue
//!                 ▼
//!               miss
//! ```
//!
//! Failures inside the cache never reach the caller: a broken or slow
//! remote store degrades to cache misses. The only error a caller can see
//! is a `flush()` attempted in production.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_cache::{CacheManager, CacheOptions, MemoryStore};
//!
//! let manager = Arc::new(CacheManager::builder(Arc::new(MemoryStore::new())).build());
//! manager.start_maintenance();
//!
//! let options = CacheOptions::new().ttl_secs(5).tag("users");
//! manager.set("user:42", &profile, &options).await;
//! let cached: Option<Profile> = manager.get("user:42", &options).await;
//! ```

pub mod keys;
pub mod local;
pub mod maintenance;
pub mod manager;
pub mod metrics;
pub mod options;
pub mod pattern;
pub mod persistence;
pub mod remote;
pub mod stats;
pub mod store;
pub mod warmup;

pub use keys::KeyBuilder;
pub use local::LocalCache;
pub use maintenance::MaintenanceHandle;
pub use manager::{CacheManager, CacheManagerBuilder};
pub use metrics::{register_metrics, CacheMetrics};
pub use options::{CacheOptions, CacheStrategy, ResolvedOptions};
pub use pattern::GlobPattern;
pub use persistence::PersistenceHook;
pub use remote::RemoteCache;
pub use stats::{CacheLayer, CacheStats, StatsRecorder};
pub use store::{MemoryStore, RedisStore, RemoteStore};
pub use strata_resilience::CircuitState;
pub use warmup::{LoaderRegistry, WarmupLoader, WarmupQueue, WarmupRequest};
