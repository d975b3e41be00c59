//! Integration tests for CacheManager over the in-memory store.

mod common;

use common::{profile, MapLoader, Profile, TestCache};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use strata_cache::{CacheOptions, CacheStrategy, CircuitState, RemoteStore};
use strata_config::{CacheConfig, CircuitBreakerSettings, Environment};
use strata_core::StrataError;

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_round_trip_until_expiry() {
    let cache = TestCache::new();
    let options = CacheOptions::new().ttl_secs(5);

    assert!(cache.manager.set("user:42", &profile("A"), &options).await);
    assert_eq!(
        cache.manager.get::<Profile>("user:42", &options).await,
        Some(profile("A"))
    );

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(cache.manager.get::<Profile>("user:42", &options).await, None);
}

#[tokio::test]
async fn test_remote_hit_is_promoted_to_local() {
    let cache = TestCache::new();
    cache.store.insert_raw("test:e:user:7", "{\"name\":\"B\"}", Some(Duration::from_secs(600)));

    let options = CacheOptions::new();
    assert_eq!(cache.manager.get::<Profile>("user:7", &options).await, Some(profile("B")));
    assert_eq!(cache.manager.local_len(), 1);

    let calls = cache.store.calls();
    assert_eq!(cache.manager.get::<Profile>("user:7", &options).await, Some(profile("B")));
    assert_eq!(cache.store.calls(), calls);
}

#[tokio::test]
async fn test_invalidate_by_tags() {
    let cache = TestCache::new();
    let t1 = CacheOptions::new().tag("t1");
    let t2 = CacheOptions::new().tag("t2");

    cache.manager.set("campaign:1", &1, &t1).await;
    cache.manager.set("campaign:2", &2, &t1).await;
    cache.manager.set("campaign:3", &3, &t2).await;

    assert_eq!(cache.manager.invalidate_by_tags(&["t1"]).await, 2);

    let options = CacheOptions::new();
    assert_eq!(cache.manager.get::<i32>("campaign:1", &options).await, None);
    assert_eq!(cache.manager.get::<i32>("campaign:2", &options).await, None);
    assert_eq!(cache.manager.get::<i32>("campaign:3", &options).await, Some(3));
}

#[tokio::test]
async fn test_tag_like_caller_key_does_not_break_tag_index() {
    let cache = TestCache::new();
    let options = CacheOptions::new();
    cache.manager.set("tag:t1", &5, &options).await;
    cache.manager.set("t:t1", &6, &options).await;

    cache.manager.set("campaign:1", &1, &CacheOptions::new().tag("t1")).await;
    assert_eq!(cache.manager.invalidate_by_tags(&["t1"]).await, 1);

    assert_eq!(cache.store.get("test:e:campaign:1").await.unwrap(), None);
    assert_eq!(cache.manager.get::<i32>("campaign:1", &options).await, None);
    assert_eq!(cache.manager.get::<i32>("tag:t1", &options).await, Some(5));
    assert_eq!(cache.manager.get::<i32>("t:t1", &options).await, Some(6));
    assert_eq!(cache.manager.get_stats().errors, 0);
}

#[tokio::test]
async fn test_mget_mixed_keys() {
    let cache = TestCache::new();
    cache
        .manager
        .mset(
            &[("a".to_string(), profile("A")), ("c".to_string(), profile("C"))],
            &CacheOptions::new(),
        )
        .await;
    // Only in the remote layer
    cache.store.insert_raw("test:e:d", "{\"name\":\"D\"}", None);

    let values = cache.manager.mget::<Profile>(&["a", "b", "c", "d"]).await;

    assert_eq!(values.len(), 4);
    assert_eq!(values["a"], Some(profile("A")));
    assert_eq!(values["b"], None);
    assert_eq!(values["c"], Some(profile("C")));
    assert_eq!(values["d"], Some(profile("D")));

    let stats = cache.manager.get_stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_degrades_to_miss() {
    let config = CacheConfig {
        circuit_breaker: CircuitBreakerSettings {
            failure_threshold: 2,
            success_threshold: 3,
            timeout_secs: 1,
        },
        ..Default::default()
    };
    let cache = TestCache::with(config, Environment::Test);
    let options = CacheOptions::new();
    cache.store.set_failing(true);

    assert_eq!(cache.manager.get::<i32>("k1", &options).await, None);
    assert_eq!(cache.manager.get::<i32>("k2", &options).await, None);
    assert_eq!(cache.manager.circuit_state(), CircuitState::Open);

    // Rejected without touching the store
    let calls = cache.store.calls();
    assert_eq!(cache.manager.get::<i32>("k3", &options).await, None);
    assert!(!cache.manager.health_check().await);
    assert_eq!(cache.store.calls(), calls);

    let stats = cache.manager.get_stats();
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.errors, 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    cache.store.set_failing(false);

    assert!(cache.manager.health_check().await);
    assert_eq!(cache.manager.circuit_state(), CircuitState::HalfOpen);
    assert!(cache.manager.health_check().await);
    assert!(cache.manager.health_check().await);
    assert_eq!(cache.manager.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_remote_outage_keeps_local_copy() {
    let cache = TestCache::new();
    cache.store.set_failing(true);

    let options = CacheOptions::new();
    assert!(!cache.manager.set("k", &1, &options).await);
    assert_eq!(cache.manager.get::<i32>("k", &options).await, Some(1));
}

#[tokio::test]
async fn test_hits_plus_misses_equals_gets() {
    let config = CacheConfig {
        circuit_breaker: CircuitBreakerSettings {
            failure_threshold: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let cache = TestCache::with(config, Environment::Test);
    let options = CacheOptions::new();
    cache.manager.set("present", &1, &options).await;
    cache.store.insert_raw("test:e:corrupt", "{not json", None);

    let mut gets = 0;
    for key in ["present", "absent", "corrupt", "present"] {
        let _ = cache.manager.get::<i32>(key, &options).await;
        gets += 1;
    }
    cache.store.set_failing(true);
    for key in ["down-1", "down-2", "present"] {
        let _ = cache.manager.get::<i32>(key, &options).await;
        gets += 1;
    }

    let stats = cache.manager.get_stats();
    assert_eq!(stats.hits + stats.misses, gets);
    assert_eq!(stats.hits, 3);
    assert!((stats.hit_rate - 3.0 / 7.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_local_capacity_eviction() {
    let cache = TestCache::new();
    let options = CacheOptions::new();

    for i in 0..1000 {
        cache.manager.set(&format!("key:{}", i), &i, &options).await;
    }
    assert_eq!(cache.manager.get_stats().evictions, 0);

    cache.manager.set("key:1000", &1000, &options).await;

    assert_eq!(cache.manager.local_len(), 1000);
    assert_eq!(cache.manager.get_stats().evictions, 1);
}

#[tokio::test]
async fn test_delete_by_pattern_and_key() {
    let cache = TestCache::new();
    let options = CacheOptions::new();
    cache.manager.set("user:1", &1, &options).await;
    cache.manager.set("user:2", &2, &options).await;
    cache.manager.set("campaign:1", &3, &options).await;

    assert_eq!(cache.manager.delete("user:*").await, 2);
    assert_eq!(cache.manager.get::<i32>("user:1", &options).await, None);
    assert_eq!(cache.manager.get::<i32>("user:2", &options).await, None);

    assert!(cache.manager.delete_key("campaign:1").await);
    assert_eq!(cache.manager.get::<i32>("campaign:1", &options).await, None);
    assert!(cache.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_ahead_queues_and_reloads() {
    let cache = TestCache::new();
    let options = CacheOptions::new()
        .ttl_secs(100)
        .strategy(CacheStrategy::RefreshAhead);
    cache.manager.set("rate:usd", &1, &options).await;

    // Local copy is capped at 60s; remote has 15% of its lifetime left.
    tokio::time::advance(Duration::from_secs(85)).await;
    assert_eq!(cache.manager.get::<i32>("rate:usd", &options).await, Some(1));
    assert_eq!(cache.manager.warmup_pending(), 1);

    let loader = Arc::new(MapLoader::with("rate:usd", json!(2)));
    cache.manager.register_loader("rate:", Arc::clone(&loader) as _);

    assert_eq!(cache.manager.drain_warmup().await, 1);
    assert_eq!(loader.calls(), 1);
    assert_eq!(cache.manager.warmup_pending(), 0);
    assert_eq!(
        cache.store.get("test:e:rate:usd").await.unwrap().as_deref(),
        Some("2")
    );
    assert_eq!(
        cache.store.remaining_ttl("test:e:rate:usd"),
        Some(Duration::from_secs(100))
    );
}

#[tokio::test(start_paused = true)]
async fn test_cache_aside_never_queues_refresh() {
    let cache = TestCache::new();
    let options = CacheOptions::new().ttl_secs(100);
    cache.manager.set("k", &1, &options).await;

    tokio::time::advance(Duration::from_secs(95)).await;
    assert_eq!(cache.manager.get::<i32>("k", &options).await, Some(1));
    assert_eq!(cache.manager.warmup_pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_drain_without_loader_drops_keys() {
    let cache = TestCache::new();
    let options = CacheOptions::new()
        .ttl_secs(100)
        .strategy(CacheStrategy::RefreshAhead);
    cache.manager.set("k", &1, &options).await;

    tokio::time::advance(Duration::from_secs(90)).await;
    cache.manager.get::<i32>("k", &options).await;
    assert_eq!(cache.manager.warmup_pending(), 1);

    assert_eq!(cache.manager.drain_warmup().await, 0);
    assert_eq!(cache.manager.warmup_pending(), 0);
}

#[tokio::test]
async fn test_flush_forbidden_in_production() {
    let cache = TestCache::with(CacheConfig::default(), Environment::Production);
    cache.manager.set("k", &1, &CacheOptions::new()).await;

    let result = cache.manager.flush().await;
    assert!(matches!(result, Err(StrataError::FlushForbidden(_))));
    assert_eq!(cache.manager.local_len(), 1);
    assert!(!cache.store.is_empty());
}

#[tokio::test]
async fn test_flush_clears_layers_and_stats() {
    let cache = TestCache::new();
    let options = CacheOptions::new();
    cache.manager.set("k", &1, &options).await;
    cache.manager.get::<i32>("k", &options).await;

    cache.manager.flush().await.unwrap();

    assert_eq!(cache.manager.local_len(), 0);
    assert!(cache.store.is_empty());
    assert_eq!(cache.manager.get_stats().hits, 0);
}

#[tokio::test]
async fn test_failed_flush_leaves_everything_in_place() {
    let cache = TestCache::new();
    let options = CacheOptions::new();
    cache.manager.set("k", &1, &options).await;
    cache.manager.get::<i32>("k", &options).await;
    cache.store.set_failing(true);

    let result = cache.manager.flush().await;
    assert!(matches!(result, Err(StrataError::Transport(_))));
    assert_eq!(cache.manager.local_len(), 1);
    assert_eq!(cache.manager.get_stats().hits, 1);

    cache.store.set_failing(false);
    assert_eq!(cache.manager.get::<i32>("k", &options).await, Some(1));
}

#[tokio::test]
async fn test_flush_with_open_circuit_is_rejected() {
    let config = CacheConfig {
        circuit_breaker: CircuitBreakerSettings {
            failure_threshold: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let cache = TestCache::with(config, Environment::Test);
    let options = CacheOptions::new();
    cache.manager.set("k", &1, &options).await;
    cache.manager.get::<i32>("k", &options).await;

    cache.store.set_failing(true);
    assert!(!cache.manager.health_check().await);
    assert_eq!(cache.manager.circuit_state(), CircuitState::Open);

    let result = cache.manager.flush().await;
    assert!(matches!(result, Err(StrataError::CircuitBreakerOpen(_))));
    assert_eq!(cache.manager.local_len(), 1);
    assert_eq!(cache.manager.get_stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_sweeps_expired_entries() {
    let cache = TestCache::new();
    cache
        .manager
        .set("short", &1, &CacheOptions::new().ttl_secs(10))
        .await;
    cache.manager.start_maintenance();
    assert!(cache.manager.maintenance_running());

    tokio::time::advance(Duration::from_secs(11)).await;
    settle().await;
    // Expired but not yet swept
    assert_eq!(cache.manager.local_len(), 1);

    tokio::time::advance(Duration::from_secs(50)).await;
    settle().await;
    assert_eq!(cache.manager.local_len(), 0);

    cache.manager.disconnect().await;
    assert!(!cache.manager.maintenance_running());
}
