//! Prometheus metrics for cache monitoring.

use crate::stats::CacheLayer;
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Metric names for the cache.
pub mod names {
    /// Total lookups answered from a cache layer.
    pub const CACHE_HITS_TOTAL: &str = "strata_cache_hits_total";
    /// Total lookups that found nothing.
    pub const CACHE_MISSES_TOTAL: &str = "strata_cache_misses_total";
    /// Total transport, serialization and persistence errors.
    pub const CACHE_ERRORS_TOTAL: &str = "strata_cache_errors_total";
    /// Total local entries evicted to make room.
    pub const CACHE_EVICTIONS_TOTAL: &str = "strata_cache_evictions_total";
    /// Current number of local entries.
    pub const CACHE_LOCAL_ENTRIES: &str = "strata_cache_local_entries";
    /// Current number of keys waiting for refresh.
    pub const CACHE_WARMUP_PENDING: &str = "strata_cache_warmup_pending";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::CACHE_HITS_TOTAL,
        "Total number of cache hits, labelled by layer"
    );
    describe_counter!(names::CACHE_MISSES_TOTAL, "Total number of cache misses");
    describe_counter!(
        names::CACHE_ERRORS_TOTAL,
        "Total number of cache errors, labelled by kind"
    );
    describe_counter!(
        names::CACHE_EVICTIONS_TOTAL,
        "Total number of local entries evicted for capacity"
    );
    describe_gauge!(
        names::CACHE_LOCAL_ENTRIES,
        "Current number of entries in the local layer"
    );
    describe_gauge!(
        names::CACHE_WARMUP_PENDING,
        "Current number of keys queued for refresh-ahead"
    );
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a hit in the given layer.
    pub fn hit(layer: CacheLayer) {
        counter!(names::CACHE_HITS_TOTAL, "layer" => layer.as_str()).increment(1);
    }

    /// Record a miss.
    pub fn miss() {
        counter!(names::CACHE_MISSES_TOTAL).increment(1);
    }

    /// Record an error of the given kind.
    pub fn error(kind: &'static str) {
        counter!(names::CACHE_ERRORS_TOTAL, "kind" => kind).increment(1);
    }

    /// Record a capacity eviction.
    pub fn eviction() {
        counter!(names::CACHE_EVICTIONS_TOTAL).increment(1);
    }

    /// Update size gauges.
    #[allow(clippy::cast_precision_loss)]
    pub fn update_sizes(local_entries: usize, warmup_pending: usize) {
        gauge!(names::CACHE_LOCAL_ENTRIES).set(local_entries as f64);
        gauge!(names::CACHE_WARMUP_PENDING).set(warmup_pending as f64);
    }
}
