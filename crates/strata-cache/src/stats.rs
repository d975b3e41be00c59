//! Hit/miss statistics.

use crate::metrics::CacheMetrics;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Layer that answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayer {
    /// In-process map.
    Local,
    /// Networked store.
    Remote,
}

impl CacheLayer {
    /// Label used for metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered by either layer.
    pub hits: u64,
    /// Lookups that returned nothing.
    pub misses: u64,
    /// Transport, serialization and persistence errors.
    pub errors: u64,
    /// Local entries evicted for capacity.
    pub evictions: u64,
    /// `hits / (hits + misses)`, zero before the first lookup.
    pub hit_rate: f64,
}

/// Running counters shared by the cache layers.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    evictions: AtomicU64,
}

impl StatsRecorder {
    /// Creates a zeroed recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit.
    pub fn record_hit(&self, layer: CacheLayer) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        CacheMetrics::hit(layer);
    }

    /// Records a miss.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        CacheMetrics::miss();
    }

    /// Records an error of the given kind.
    pub fn record_error(&self, kind: &'static str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        CacheMetrics::error(kind);
    }

    /// Records a capacity eviction.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        CacheMetrics::eviction();
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            errors: self.errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = StatsRecorder::new();
        assert_eq!(stats.snapshot().hit_rate, 0.0);

        stats.record_hit(CacheLayer::Local);
        stats.record_hit(CacheLayer::Remote);
        stats.record_hit(CacheLayer::Local);
        stats.record_miss();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 1);
        assert!((snapshot.hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let stats = StatsRecorder::new();
        stats.record_error("transport");
        let before = stats.snapshot();

        stats.record_error("serialization");
        stats.record_eviction();

        assert_eq!(before.errors, 1);
        assert_eq!(before.evictions, 0);
        assert_eq!(stats.snapshot().errors, 2);
        assert_eq!(stats.snapshot().evictions, 1);
    }

    #[test]
    fn test_reset() {
        let stats = StatsRecorder::new();
        stats.record_hit(CacheLayer::Local);
        stats.record_miss();
        stats.record_eviction();
        stats.reset();
        assert_eq!(stats.snapshot(), CacheStats::default());
    }
}
