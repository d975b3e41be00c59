//! Refresh-ahead queue and value loaders.
//!
//! A remote hit whose remaining lifetime has dropped below the configured
//! fraction is queued here instead of being refreshed inline. The periodic
//! drain asks the loader registered for the key's prefix to regenerate it.
//! Keys with no matching loader are dropped from the queue and left to
//! expire normally.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_core::StrataResult;

/// Regenerates the value for a key from its source of truth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WarmupLoader: Send + Sync {
    /// Loads the current value. `Ok(None)` means the key no longer exists.
    async fn load(&self, key: &str) -> StrataResult<Option<serde_json::Value>>;
}

/// How a queued key should be written back once reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupRequest {
    pub ttl: Duration,
    pub tags: Vec<String>,
}

/// Keys pending refresh. Re-queueing a key replaces its request.
#[derive(Debug, Default)]
pub struct WarmupQueue {
    pending: Mutex<HashMap<String, WarmupRequest>>,
}

impl WarmupQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a key. Returns true if it was not already pending.
    pub fn enqueue(&self, key: &str, request: WarmupRequest) -> bool {
        self.pending.lock().insert(key.to_string(), request).is_none()
    }

    /// Takes every pending key, leaving the queue empty.
    pub fn drain(&self) -> Vec<(String, WarmupRequest)> {
        self.pending.lock().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn clear(&self) {
        self.pending.lock().clear();
    }
}

/// Loaders keyed by key prefix.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: RwLock<Vec<(String, Arc<dyn WarmupLoader>)>>,
}

impl LoaderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loader for keys starting with `prefix`, replacing any
    /// loader already registered for the same prefix.
    pub fn register(&self, prefix: impl Into<String>, loader: Arc<dyn WarmupLoader>) {
        let prefix = prefix.into();
        let mut loaders = self.loaders.write();
        loaders.retain(|(existing, _)| *existing != prefix);
        loaders.push((prefix, loader));
    }

    /// Finds the loader with the longest prefix matching `key`.
    pub fn resolve(&self, key: &str) -> Option<Arc<dyn WarmupLoader>> {
        self.loaders
            .read()
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, loader)| Arc::clone(loader))
    }

    pub fn len(&self) -> usize {
        self.loaders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.read().is_empty()
    }
}
