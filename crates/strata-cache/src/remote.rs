//! Remote cache layer.

use crate::keys::KeyBuilder;
use crate::stats::StatsRecorder;
use crate::store::RemoteStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{StrataError, StrataResult};
use strata_resilience::{CircuitBreaker, CircuitBreakerError, CircuitState};
use tracing::{debug, warn};

/// Serializes values into the remote store and keeps tag indexes.
///
/// Every store command runs through the circuit breaker. A rejected call
/// or a failed command comes back as `None`, `false` or zero; callers
/// never see transport errors. Failures are counted as stats errors, but
/// hits and misses are left to the caller so a lookup touching both
/// layers is counted once.
pub struct RemoteCache {
    store: Arc<dyn RemoteStore>,
    breaker: CircuitBreaker,
    keys: KeyBuilder,
    stats: Arc<StatsRecorder>,
    tag_ttl: Duration,
}

impl RemoteCache {
    /// Creates a remote layer over `store`.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        breaker: CircuitBreaker,
        keys: KeyBuilder,
        stats: Arc<StatsRecorder>,
        tag_ttl: Duration,
    ) -> Self {
        Self {
            store,
            breaker,
            keys,
            stats,
            tag_ttl,
        }
    }

    /// Current breaker state.
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    async fn guarded<T, F, Fut>(&self, op: &'static str, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StrataResult<T>>,
    {
        match self
            .breaker
            .call_with(f, StrataError::should_trip_circuit_breaker)
            .await
        {
            Ok(value) => Some(value),
            Err(CircuitBreakerError::Open(_)) => {
                debug!(op, "Remote cache skipped, circuit open");
                None
            }
            Err(CircuitBreakerError::Failure(e)) => {
                warn!(op, code = e.error_code(), error = %e, "Remote cache operation failed");
                self.stats.record_error(error_kind(&e));
                None
            }
        }
    }

    /// Raw JSON stored under `key`.
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        let remote_key = self.keys.entry(key);
        self.guarded("get", || self.store.get(&remote_key))
            .await
            .flatten()
    }

    /// Raw JSON stored under `key` and its remaining lifetime, read in one
    /// round trip.
    pub async fn get_raw_with_ttl(&self, key: &str) -> Option<(String, Option<Duration>)> {
        let remote_key = self.keys.entry(key);
        self.guarded("get+pttl", || self.store.get_with_ttl(&remote_key))
            .await
            .flatten()
    }

    /// Typed value stored under `key`. A corrupt payload is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        decode(&self.stats, key, &raw)
    }

    /// Writes raw JSON and indexes the key under each tag.
    ///
    /// Returns true if the value itself was written. Tag index failures are
    /// logged and counted but do not fail the write.
    pub async fn set_raw(&self, key: &str, raw: &str, ttl: Duration, tags: &[String]) -> bool {
        let remote_key = self.keys.entry(key);
        if self
            .guarded("set", || self.store.set_ex(&remote_key, raw, ttl))
            .await
            .is_none()
        {
            return false;
        }

        self.index_tags(&[key.to_string()], tags).await;
        debug!(key, ttl_secs = ttl.as_secs(), "Remote cache set");
        true
    }

    /// Serializes and writes a value.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, tags: &[String]) -> bool {
        match encode(&self.stats, key, value) {
            Some(raw) => self.set_raw(key, &raw, ttl, tags).await,
            None => false,
        }
    }

    async fn index_tags(&self, keys: &[String], tags: &[String]) {
        for tag in tags {
            let tag_key = self.keys.tag(tag);
            for key in keys {
                self.guarded("sadd", || self.store.sadd(&tag_key, key))
                    .await;
            }
            // Refreshed on every write so idle indexes expire on their own.
            self.guarded("expire", || self.store.expire(&tag_key, self.tag_ttl))
                .await;
        }
    }

    /// Raw values for `keys`, one slot per key in order.
    pub async fn mget_raw(&self, keys: &[String]) -> Vec<Option<String>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let remote_keys: Vec<String> = keys.iter().map(|k| self.keys.entry(k)).collect();
        let mut values = self
            .guarded("mget", || self.store.mget(&remote_keys))
            .await
            .unwrap_or_default();
        values.resize(keys.len(), None);
        values
    }

    /// Typed values for `keys`. Every requested key is present in the map;
    /// missing or corrupt entries map to `None`.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> HashMap<String, Option<T>> {
        let values = self.mget_raw(keys).await;
        keys.iter()
            .zip(values)
            .map(|(key, raw)| {
                let value = raw.and_then(|raw| decode(&self.stats, key, &raw));
                (key.clone(), value)
            })
            .collect()
    }

    /// Writes several raw values in one pipelined round trip.
    pub async fn mset_raw(&self, entries: &[(String, String)], ttl: Duration, tags: &[String]) -> bool {
        if entries.is_empty() {
            return true;
        }

        let remote_entries: Vec<(String, String)> = entries
            .iter()
            .map(|(key, raw)| (self.keys.entry(key), raw.clone()))
            .collect();
        if self
            .guarded("mset", || self.store.mset_ex(&remote_entries, ttl))
            .await
            .is_none()
        {
            return false;
        }

        if !tags.is_empty() {
            let keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
            self.index_tags(&keys, tags).await;
        }
        debug!(count = entries.len(), "Remote cache mset");
        true
    }

    /// Serializes and writes several values. Values that fail to serialize
    /// are counted as errors and skipped.
    pub async fn mset<T: Serialize>(&self, entries: &[(String, T)], ttl: Duration, tags: &[String]) -> bool {
        let raw: Vec<(String, String)> = entries
            .iter()
            .filter_map(|(key, value)| encode(&self.stats, key, value).map(|raw| (key.clone(), raw)))
            .collect();
        self.mset_raw(&raw, ttl, tags).await
    }

    /// Deletes every key matching a glob pattern. Scans the whole keyspace.
    pub async fn delete(&self, pattern: &str) -> u64 {
        let remote_pattern = self.keys.pattern(pattern);
        let Some(matched) = self
            .guarded("keys", || self.store.keys(&remote_pattern))
            .await
        else {
            return 0;
        };
        if matched.is_empty() {
            return 0;
        }

        let deleted = self
            .guarded("del", || self.store.del(&matched))
            .await
            .unwrap_or(0);
        debug!(pattern, deleted, "Remote cache pattern delete");
        deleted
    }

    /// Deletes a single key. Returns true if it existed.
    pub async fn delete_key(&self, key: &str) -> bool {
        let remote_keys = [self.keys.entry(key)];
        self.guarded("del", || self.store.del(&remote_keys))
            .await
            .is_some_and(|deleted| deleted > 0)
    }

    /// Deletes every key indexed under any of `tags`, plus the indexes.
    ///
    /// Returns the caller-facing keys that were indexed. Keys tagged after
    /// the member sets were read are not affected.
    pub async fn invalidate_by_tags(&self, tags: &[String]) -> Vec<String> {
        let mut members = BTreeSet::new();
        let mut doomed = Vec::new();

        for tag in tags {
            let tag_key = self.keys.tag(tag);
            if let Some(keys) = self
                .guarded("smembers", || self.store.smembers(&tag_key))
                .await
            {
                members.extend(keys);
            }
            doomed.push(tag_key);
        }

        doomed.extend(members.iter().map(|key| self.keys.entry(key)));
        let deleted = self
            .guarded("del", || self.store.del(&doomed))
            .await
            .unwrap_or(0);

        debug!(tags = ?tags, keys = members.len(), deleted, "Invalidated tags");
        members.into_iter().collect()
    }

    /// Pings the store through the breaker.
    pub async fn ping(&self) -> bool {
        self.guarded("ping", || self.store.ping()).await.is_some()
    }

    /// Removes everything from the store. Unlike other operations, failures
    /// are returned.
    pub async fn flush(&self) -> StrataResult<()> {
        self.breaker
            .call_with(|| self.store.flush_db(), StrataError::should_trip_circuit_breaker)
            .await
            .map_err(StrataError::from)
    }

    /// Releases the store's connections.
    pub async fn close(&self) {
        self.store.close().await;
    }
}

fn error_kind(error: &StrataError) -> &'static str {
    match error {
        StrataError::Timeout(_) => "timeout",
        StrataError::Serialization(_) => "serialization",
        StrataError::Cache(_) => "cache",
        _ => "transport",
    }
}

/// Decodes a stored payload, counting a failure as a serialization error.
pub(crate) fn decode<T: DeserializeOwned>(stats: &StatsRecorder, key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Discarding undecodable cache payload");
            stats.record_error("serialization");
            None
        }
    }
}

/// Encodes a value for storage, counting a failure as a serialization error.
pub(crate) fn encode<T: Serialize + ?Sized>(stats: &StatsRecorder, key: &str, value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!(key, error = %e, "Cannot serialize cache value");
            stats.record_error("serialization");
            None
        }
    }
}
