//! Cache manager: the single entry point combining both layers.

use crate::keys::KeyBuilder;
use crate::local::LocalCache;
use crate::maintenance::MaintenanceHandle;
use crate::metrics::CacheMetrics;
use crate::options::{CacheOptions, CacheStrategy, ResolvedOptions};
use crate::pattern::GlobPattern;
use crate::persistence::PersistenceHook;
use crate::remote::{decode, encode, RemoteCache};
use crate::stats::{CacheLayer, CacheStats, StatsRecorder};
use crate::store::RemoteStore;
use crate::warmup::{LoaderRegistry, WarmupLoader, WarmupQueue, WarmupRequest};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strata_config::{AppConfig, CacheConfig, Environment};
use strata_core::{StrataError, StrataResult};
use strata_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use tracing::{debug, error, info, warn};

/// Builder for [`CacheManager`].
pub struct CacheManagerBuilder {
    store: Arc<dyn RemoteStore>,
    config: CacheConfig,
    key_prefix: String,
    environment: Environment,
    persistence: Option<Arc<dyn PersistenceHook>>,
}

impl CacheManagerBuilder {
    fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            config: CacheConfig::default(),
            key_prefix: KeyBuilder::default().prefix().to_string(),
            environment: Environment::default(),
            persistence: None,
        }
    }

    /// Sets cache tuning.
    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the prefix for every remote key.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the environment, which decides whether `flush` is allowed.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Registers the hook used by write-through and write-behind writes.
    #[must_use]
    pub fn persistence(mut self, hook: Arc<dyn PersistenceHook>) -> Self {
        self.persistence = Some(hook);
        self
    }

    /// Builds the manager. Background maintenance is not started.
    pub fn build(self) -> CacheManager {
        let stats = Arc::new(StatsRecorder::new());
        let breaker_settings = &self.config.circuit_breaker;
        let breaker = CircuitBreaker::new(
            "remote-cache",
            CircuitBreakerConfig {
                failure_threshold: breaker_settings.failure_threshold,
                success_threshold: breaker_settings.success_threshold,
                timeout: breaker_settings.timeout(),
            },
        );

        let remote = RemoteCache::new(
            self.store,
            breaker,
            KeyBuilder::new(self.key_prefix),
            Arc::clone(&stats),
            self.config.tag_ttl(),
        );

        CacheManager {
            local: LocalCache::new(self.config.local_capacity, Arc::clone(&stats)),
            remote,
            stats,
            config: self.config,
            environment: self.environment,
            persistence: self.persistence,
            warmup_queue: WarmupQueue::new(),
            loaders: LoaderRegistry::new(),
            maintenance: Mutex::new(None),
        }
    }
}

/// Two-layer cache with statistics, tag invalidation and refresh-ahead.
///
/// Construct one per process and share it behind an `Arc`. Reads check
/// the local layer, then the remote layer through the circuit breaker.
/// Remote hits are copied into the local layer with a TTL capped by
/// `local_ttl_cap_secs`, which bounds how long the layers can disagree.
///
/// No read or write returns an error: remote failures and corrupt
/// payloads become misses and are counted in [`CacheStats::errors`].
pub struct CacheManager {
    local: LocalCache,
    remote: RemoteCache,
    stats: Arc<StatsRecorder>,
    config: CacheConfig,
    environment: Environment,
    persistence: Option<Arc<dyn PersistenceHook>>,
    warmup_queue: WarmupQueue,
    loaders: LoaderRegistry,
    maintenance: Mutex<Option<MaintenanceHandle>>,
}

impl CacheManager {
    /// Starts building a manager over `store`.
    pub fn builder(store: Arc<dyn RemoteStore>) -> CacheManagerBuilder {
        CacheManagerBuilder::new(store)
    }

    /// Starts building a manager configured from the application config.
    pub fn from_app_config(store: Arc<dyn RemoteStore>, config: &AppConfig) -> CacheManagerBuilder {
        CacheManagerBuilder::new(store)
            .config(config.cache.clone())
            .key_prefix(config.redis.key_prefix.clone())
            .environment(config.app.environment)
    }

    // ============ Reads ============

    /// Looks a key up in the local layer, then the remote layer.
    ///
    /// Every call records exactly one hit or one miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, options: &CacheOptions) -> Option<T> {
        if let Some(raw) = self.local.get(key) {
            if let Some(value) = decode(&self.stats, key, &raw) {
                self.stats.record_hit(CacheLayer::Local);
                debug!(key, "Local cache hit");
                return Some(value);
            }
            self.local.remove(key);
        }

        let resolved = options.resolve(&self.config);
        let found = if resolved.strategy == CacheStrategy::RefreshAhead {
            self.remote.get_raw_with_ttl(key).await
        } else {
            self.remote.get_raw(key).await.map(|raw| (raw, None))
        };

        let Some((raw, remaining)) = found else {
            self.stats.record_miss();
            debug!(key, "Cache miss");
            return None;
        };

        let Some(value) = decode(&self.stats, key, &raw) else {
            self.stats.record_miss();
            return None;
        };

        let local_ttl = remaining.unwrap_or(resolved.ttl);
        self.local.set(key, raw, self.cap_local_ttl(local_ttl));
        self.stats.record_hit(CacheLayer::Remote);
        debug!(key, "Remote cache hit");

        if remaining.is_some_and(|remaining| resolved.wants_refresh(remaining)) {
            self.schedule_refresh(key, &resolved);
        }
        Some(value)
    }

    /// Looks several keys up. Every requested key appears in the result.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[impl AsRef<str>]) -> HashMap<String, Option<T>> {
        let mut results = HashMap::with_capacity(keys.len());
        let mut remote_keys = Vec::new();

        for key in keys {
            let key = key.as_ref();
            let local = self
                .local
                .get(key)
                .and_then(|raw| decode::<T>(&self.stats, key, &raw));
            match local {
                Some(value) => {
                    self.stats.record_hit(CacheLayer::Local);
                    results.insert(key.to_string(), Some(value));
                }
                None => remote_keys.push(key.to_string()),
            }
        }

        let raws = self.remote.mget_raw(&remote_keys).await;
        let local_ttl = self.cap_local_ttl(self.config.default_ttl());
        for (key, raw) in remote_keys.into_iter().zip(raws) {
            let value = raw.and_then(|raw| {
                let value = decode::<T>(&self.stats, &key, &raw)?;
                self.local.set(&key, raw, local_ttl);
                Some(value)
            });

            if value.is_some() {
                self.stats.record_hit(CacheLayer::Remote);
            } else {
                self.stats.record_miss();
            }
            results.insert(key, value);
        }

        results
    }

    /// Returns the cached value, or computes, stores and returns it.
    ///
    /// Errors from `factory` are returned unchanged and nothing is cached.
    pub async fn get_or_set<T, F, Fut, E>(&self, key: &str, options: &CacheOptions, factory: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key, options).await {
            return Ok(value);
        }

        let value = factory().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    // ============ Writes ============

    /// Stores a value according to the options' strategy.
    ///
    /// Returns true if the value reached the remote layer. The local layer
    /// is written whenever the strategy allows caching, even if the remote
    /// write failed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: &CacheOptions) -> bool {
        let resolved = options.resolve(&self.config);

        if !resolved.strategy.needs_persistence() {
            let Some(raw) = encode(&self.stats, key, value) else {
                return false;
            };
            return self.store(key, raw, &resolved).await;
        }

        let Some(hook) = self.persistence_hook(key, resolved.strategy) else {
            return false;
        };
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Cannot serialize cache value");
                self.stats.record_error("serialization");
                return false;
            }
        };
        let raw = json.to_string();

        if resolved.strategy == CacheStrategy::WriteThrough {
            if let Err(e) = hook.write(key, &json).await {
                warn!(key, error = %e, "Write-through persistence failed, value not cached");
                self.stats.record_error("persistence");
                return false;
            }
            return self.store(key, raw, &resolved).await;
        }

        let written = self.store(key, raw, &resolved).await;
        let stats = Arc::clone(&self.stats);
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(e) = hook.write(&key, &json).await {
                error!(key = %key, error = %e, "Write-behind persistence failed");
                stats.record_error("persistence");
            }
        });
        written
    }

    /// Stores several values with shared options.
    ///
    /// Cache-aside and refresh-ahead writes go out in one pipelined round
    /// trip. Strategies with a persistence hook write each entry in turn.
    pub async fn mset<T: Serialize>(&self, entries: &[(String, T)], options: &CacheOptions) -> bool {
        let resolved = options.resolve(&self.config);

        if resolved.strategy.needs_persistence() {
            let mut all_written = true;
            for (key, value) in entries {
                all_written &= self.set(key, value, options).await;
            }
            return all_written;
        }

        let raw: Vec<(String, String)> = entries
            .iter()
            .filter_map(|(key, value)| encode(&self.stats, key, value).map(|raw| (key.clone(), raw)))
            .collect();
        let encoded_all = raw.len() == entries.len();
        let written = self.remote.mset_raw(&raw, resolved.ttl, &resolved.tags).await;

        let local_ttl = self.cap_local_ttl(resolved.ttl);
        for (key, raw) in raw {
            self.local.set(&key, raw, local_ttl);
        }
        written && encoded_all
    }

    fn persistence_hook(&self, key: &str, strategy: CacheStrategy) -> Option<Arc<dyn PersistenceHook>> {
        let hook = self.persistence.clone();
        if hook.is_none() {
            error!(
                key,
                strategy = ?strategy,
                "Strategy requires a persistence hook but none is registered, value not cached"
            );
            self.stats.record_error("configuration");
        }
        hook
    }

    async fn store(&self, key: &str, raw: String, resolved: &ResolvedOptions) -> bool {
        let written = self
            .remote
            .set_raw(key, &raw, resolved.ttl, &resolved.tags)
            .await;
        self.local.set(key, raw, self.cap_local_ttl(resolved.ttl));
        debug!(key, remote = written, "Cache set");
        written
    }

    fn cap_local_ttl(&self, ttl: Duration) -> Duration {
        ttl.min(self.config.local_ttl_cap())
    }

    // ============ Invalidation ============

    /// Deletes every key matching a glob pattern from both layers.
    ///
    /// Scans the whole remote keyspace. Returns the number of remote keys
    /// removed.
    pub async fn delete(&self, pattern: &str) -> u64 {
        match GlobPattern::new(pattern) {
            Ok(glob) => {
                let local = self.local.remove_matching(&glob);
                debug!(pattern, local, "Removed local entries by pattern");
            }
            Err(e) => {
                warn!(pattern, error = %e, "Invalid delete pattern");
                return 0;
            }
        }
        self.remote.delete(pattern).await
    }

    /// Deletes a single key from both layers. Returns true if either held it.
    pub async fn delete_key(&self, key: &str) -> bool {
        let local = self.local.remove(key);
        let remote = self.remote.delete_key(key).await;
        local || remote
    }

    /// Deletes every key written with any of `tags` from both layers.
    ///
    /// Returns the number of keys that were indexed under the tags.
    pub async fn invalidate_by_tags(&self, tags: &[impl AsRef<str>]) -> usize {
        let tags: Vec<String> = tags.iter().map(|tag| tag.as_ref().to_string()).collect();
        let keys = self.remote.invalidate_by_tags(&tags).await;
        for key in &keys {
            self.local.remove(key);
        }
        info!(tags = ?tags, keys = keys.len(), "Invalidated cache tags");
        keys.len()
    }

    // ============ Warmup ============

    /// Registers a loader for keys starting with `prefix`. Used when
    /// draining the refresh-ahead queue.
    pub fn register_loader(&self, prefix: impl Into<String>, loader: Arc<dyn WarmupLoader>) {
        let prefix = prefix.into();
        debug!(prefix = %prefix, "Registered warmup loader");
        self.loaders.register(prefix, loader);
    }

    /// Loads `keys` through `loader` and caches every value found.
    ///
    /// Loads run concurrently. Returns the number of keys cached.
    pub async fn warmup(&self, keys: &[impl AsRef<str>], loader: &dyn WarmupLoader, options: &CacheOptions) -> usize {
        let resolved = options.resolve(&self.config);
        let loads = join_all(keys.iter().map(|key| async move {
            let key = key.as_ref();
            (key, loader.load(key).await)
        }))
        .await;

        let mut cached = 0;
        for (key, loaded) in loads {
            if self.store_loaded(key, loaded, &resolved).await {
                cached += 1;
            }
        }

        info!(requested = keys.len(), cached, "Cache warmup complete");
        cached
    }

    /// Reloads every key queued by refresh-ahead reads.
    ///
    /// Keys with no registered loader are dropped from the queue. Returns
    /// the number of keys refreshed.
    pub async fn drain_warmup(&self) -> usize {
        let pending = self.warmup_queue.drain();
        if pending.is_empty() {
            return 0;
        }

        let mut refreshed = 0;
        for (key, request) in pending {
            let Some(loader) = self.loaders.resolve(&key) else {
                debug!(key = %key, "No warmup loader registered, skipping refresh");
                continue;
            };

            let resolved = ResolvedOptions {
                ttl: request.ttl,
                strategy: CacheStrategy::RefreshAhead,
                tags: request.tags,
                refresh_ahead: self.config.refresh_ahead_fraction,
            };
            let loaded = loader.load(&key).await;
            if self.store_loaded(&key, loaded, &resolved).await {
                refreshed += 1;
            }
        }

        if refreshed > 0 {
            info!(refreshed, "Refreshed cache entries ahead of expiry");
        }
        refreshed
    }

    async fn store_loaded(
        &self,
        key: &str,
        loaded: StrataResult<Option<serde_json::Value>>,
        resolved: &ResolvedOptions,
    ) -> bool {
        match loaded {
            Ok(Some(value)) => self.store(key, value.to_string(), resolved).await,
            Ok(None) => {
                debug!(key, "Loader found no value, removing cached entry");
                self.delete_key(key).await;
                false
            }
            Err(e) => {
                warn!(key, error = %e, "Warmup load failed");
                self.stats.record_error("warmup");
                false
            }
        }
    }

    fn schedule_refresh(&self, key: &str, resolved: &ResolvedOptions) {
        let request = WarmupRequest {
            ttl: resolved.ttl,
            tags: resolved.tags.clone(),
        };
        if self.warmup_queue.enqueue(key, request) {
            debug!(key, "Queued key for refresh-ahead");
        }
    }

    // ============ Maintenance ============

    /// Removes expired local entries. Returns how many were dropped.
    pub fn sweep_local(&self) -> usize {
        self.local.sweep()
    }

    /// Logs the current statistics and updates size gauges.
    pub fn report_stats(&self) -> CacheStats {
        let stats = self.stats.snapshot();
        let local_entries = self.local.len();
        let warmup_pending = self.warmup_queue.len();
        CacheMetrics::update_sizes(local_entries, warmup_pending);

        info!(
            hits = stats.hits,
            misses = stats.misses,
            errors = stats.errors,
            evictions = stats.evictions,
            hit_rate = stats.hit_rate,
            local_entries,
            warmup_pending,
            circuit = %self.remote.state(),
            "Cache statistics"
        );
        stats
    }

    /// Starts the sweep, statistics and warmup tasks. Calling it again
    /// while they run has no effect.
    pub fn start_maintenance(self: &Arc<Self>) {
        let mut maintenance = self.maintenance.lock();
        if maintenance.is_some() {
            warn!("Cache maintenance already running");
            return;
        }
        *maintenance = Some(MaintenanceHandle::spawn(Arc::downgrade(self), &self.config));
    }

    /// Returns true while maintenance tasks are running.
    pub fn maintenance_running(&self) -> bool {
        self.maintenance
            .lock()
            .as_ref()
            .is_some_and(MaintenanceHandle::is_running)
    }

    /// Stops maintenance and releases remote connections.
    pub async fn disconnect(&self) {
        let handle = self.maintenance.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        self.remote.close().await;
        info!("Cache manager disconnected");
    }

    /// Clears both layers and resets statistics.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::FlushForbidden`] in production. A remote
    /// failure is returned too, and then nothing is cleared.
    pub async fn flush(&self) -> StrataResult<()> {
        if !self.environment.allows_flush() {
            return Err(StrataError::FlushForbidden(self.environment.to_string()));
        }

        self.remote.flush().await?;
        self.local.clear();
        self.warmup_queue.clear();
        self.stats.reset();
        warn!(environment = %self.environment, "Cache flushed");
        Ok(())
    }

    // ============ Introspection ============

    /// Returns a copy of the running counters.
    pub fn get_stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Pings the remote store through the circuit breaker.
    pub async fn health_check(&self) -> bool {
        self.remote.ping().await
    }

    /// Current state of the breaker guarding the remote store.
    pub fn circuit_state(&self) -> CircuitState {
        self.remote.state()
    }

    /// Number of entries in the local layer.
    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    /// Number of keys waiting for refresh.
    pub fn warmup_pending(&self) -> usize {
        self.warmup_queue.len()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MockPersistenceHook;
    use crate::store::MemoryStore;
    use crate::warmup::MockWarmupLoader;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn manager_with(store: &Arc<MemoryStore>, hook: Option<MockPersistenceHook>) -> CacheManager {
        let mut builder = CacheManager::builder(Arc::clone(store) as Arc<dyn RemoteStore>);
        if let Some(hook) = hook {
            builder = builder.persistence(Arc::new(hook));
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_write_through_persists_then_caches() {
        let store = Arc::new(MemoryStore::new());
        let mut hook = MockPersistenceHook::new();
        hook.expect_write()
            .withf(|key, value| key == "order:1" && *value == json!({"total": 10}))
            .times(1)
            .returning(|_, _| Ok(()));
        let manager = manager_with(&store, Some(hook));

        let options = CacheOptions::new().strategy(CacheStrategy::WriteThrough);
        assert!(manager.set("order:1", &json!({"total": 10}), &options).await);
        assert_eq!(
            manager.get::<serde_json::Value>("order:1", &options).await,
            Some(json!({"total": 10}))
        );
    }

    #[tokio::test]
    async fn test_write_through_failure_skips_cache() {
        let store = Arc::new(MemoryStore::new());
        let mut hook = MockPersistenceHook::new();
        hook.expect_write()
            .times(1)
            .returning(|key, _| Err(StrataError::persistence(key, "database unavailable")));
        let manager = manager_with(&store, Some(hook));

        let options = CacheOptions::new().strategy(CacheStrategy::WriteThrough);
        assert!(!manager.set("order:1", &1, &options).await);
        assert_eq!(manager.local_len(), 0);
        assert!(store.is_empty());
        assert_eq!(manager.get_stats().errors, 1);
    }

    #[tokio::test]
    async fn test_write_behind_caches_then_persists() {
        let store = Arc::new(MemoryStore::new());
        let persisted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&persisted);

        let mut hook = MockPersistenceHook::new();
        hook.expect_write().times(1).returning(move |_, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        let manager = manager_with(&store, Some(hook));

        let options = CacheOptions::new().strategy(CacheStrategy::WriteBehind);
        assert!(manager.set("order:2", &2, &options).await);
        assert_eq!(manager.local_len(), 1);

        for _ in 0..100 {
            if persisted.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(persisted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_persistence_strategy_without_hook_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(&store, None);

        for strategy in [CacheStrategy::WriteThrough, CacheStrategy::WriteBehind] {
            let options = CacheOptions::new().strategy(strategy);
            assert!(!manager.set("order:3", &3, &options).await);
        }
        assert_eq!(manager.local_len(), 0);
        assert!(store.is_empty());
        assert_eq!(manager.get_stats().errors, 2);
    }

    #[tokio::test]
    async fn test_warmup_with_loader() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(&store, None);

        let mut loader = MockWarmupLoader::new();
        loader.expect_load().returning(|key| match key {
            "user:1" => Ok(Some(json!({"name": "A"}))),
            "user:2" => Ok(None),
            _ => Err(StrataError::internal("source down")),
        });

        let keys = ["user:1", "user:2", "user:3"];
        let cached = manager.warmup(&keys, &loader, &CacheOptions::new()).await;

        assert_eq!(cached, 1);
        assert_eq!(manager.get_stats().errors, 1);
        assert_eq!(
            manager.get::<serde_json::Value>("user:1", &CacheOptions::new()).await,
            Some(json!({"name": "A"}))
        );
    }

    #[tokio::test]
    async fn test_get_or_set() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(&store, None);
        let options = CacheOptions::new().ttl_secs(30);

        let first: Result<i32, StrataError> = manager.get_or_set("answer", &options, || async { Ok(42) }).await;
        assert_eq!(first.unwrap(), 42);

        let second: Result<i32, StrataError> = manager
            .get_or_set("answer", &options, || async { Err(StrataError::internal("not called")) })
            .await;
        assert_eq!(second.unwrap(), 42);

        let failed: Result<i32, StrataError> = manager
            .get_or_set("other", &options, || async { Err(StrataError::internal("boom")) })
            .await;
        assert!(failed.is_err());
        assert_eq!(manager.get::<i32>("other", &options).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_ttl_is_capped() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(&store, None);
        manager.set("k", &1, &CacheOptions::new().ttl_secs(3600)).await;

        assert_eq!(manager.local.remaining_ttl("k"), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_corrupt_local_entry_falls_through_to_remote() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(&store, None);
        manager.set("k", &7, &CacheOptions::new()).await;
        manager
            .local
            .set("k", "garbage".to_string(), Duration::from_secs(60));

        assert_eq!(manager.get::<i32>("k", &CacheOptions::new()).await, Some(7));
        let stats = manager.get_stats();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }
}
