//! Bounded in-process cache layer.

use crate::pattern::GlobPattern;
use crate::stats::StatsRecorder;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default number of entries held locally.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Bounded key/value map with per-entry expiry.
///
/// When full, inserting a new key evicts the earliest inserted key.
/// Overwriting a key keeps its original position. Entries are only ever
/// read with `peek`, so the underlying list order is insertion order.
/// Expired entries are removed lazily on `get` and in bulk by [`sweep`],
/// never by a scan on the request path.
///
/// [`sweep`]: LocalCache::sweep
pub struct LocalCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: usize,
    stats: Arc<StatsRecorder>,
}

impl LocalCache {
    /// Creates a local cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, stats: Arc<StatsRecorder>) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            capacity: capacity.max(1),
            stats,
        }
    }

    /// Returns the value if present and unexpired; evicts it if stale.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let lookup = entries
            .peek(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Returns the remaining lifetime of a live entry.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Inserts or overwrites an entry expiring `ttl` from now.
    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.peek_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }

        if entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.pop_lru() {
                self.stats.record_eviction();
                debug!(key = %evicted, "Evicted oldest local entry");
            }
        }

        entries.put(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Removes a single entry.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Removes every entry whose key matches the pattern.
    pub fn remove_matching(&self, pattern: &GlobPattern) -> usize {
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "Swept expired local entries");
        }
        expired.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
