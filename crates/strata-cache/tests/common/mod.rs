//! Common test infrastructure for cache integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_cache::{CacheManager, MemoryStore, RemoteStore, WarmupLoader};
use strata_config::{CacheConfig, Environment};
use strata_core::StrataResult;

/// Cache manager wired to an in-memory store.
pub struct TestCache {
    pub store: Arc<MemoryStore>,
    pub manager: Arc<CacheManager>,
}

impl TestCache {
    /// Creates a cache with default tuning in the test environment.
    pub fn new() -> Self {
        Self::with(CacheConfig::default(), Environment::Test)
    }

    /// Creates a cache with the given tuning and environment.
    pub fn with(config: CacheConfig, environment: Environment) -> Self {
        let store = Arc::new(MemoryStore::new());
        let manager = CacheManager::builder(Arc::clone(&store) as Arc<dyn RemoteStore>)
            .config(config)
            .key_prefix("test:")
            .environment(environment)
            .build();

        Self {
            store,
            manager: Arc::new(manager),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
}

pub fn profile(name: &str) -> Profile {
    Profile {
        name: name.to_string(),
    }
}

/// Loader serving values from a fixed map and counting calls.
#[derive(Default)]
pub struct MapLoader {
    values: HashMap<String, serde_json::Value>,
    calls: AtomicUsize,
}

impl MapLoader {
    pub fn with(key: &str, value: serde_json::Value) -> Self {
        let mut loader = Self::default();
        loader.values.insert(key.to_string(), value);
        loader
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WarmupLoader for MapLoader {
    async fn load(&self, key: &str) -> StrataResult<Option<serde_json::Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.values.get(key).cloned())
    }
}
