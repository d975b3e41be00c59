//! Application configuration structures.

use crate::Environment;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strata_core::LoggingConfig;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and environment.
    #[serde(default)]
    pub app: AppMetadata,

    /// Remote store connection.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Cache layer tuning.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Environment (development, test, staging, production).
    #[serde(default)]
    pub environment: Environment,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "strata-cache".to_string(),
            environment: Environment::Development,
        }
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Enable the remote layer (disabled means local-only caching).
    pub enabled: bool,
    /// Redis URL.
    pub url: String,
    /// Connection pool size.
    pub pool_size: usize,
    /// Prefix applied to every key the cache writes.
    pub key_prefix: String,
    /// Upper bound for a single remote command, in milliseconds.
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: "strata:".to_string(),
            command_timeout_ms: 2_000,
        }
    }
}

impl RedisConfig {
    /// Returns the command timeout as a Duration.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Prometheus scrape endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve metrics over HTTP.
    pub enabled: bool,
    /// Address the scrape endpoint listens on.
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "0.0.0.0:9100".to_string(),
        }
    }
}

/// Cache layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries held in the local layer.
    pub local_capacity: usize,
    /// Upper bound for any local entry's TTL, in seconds.
    pub local_ttl_cap_secs: u64,
    /// TTL applied when a caller does not pass one, in seconds.
    pub default_ttl_secs: u64,
    /// Expiry of tag index sets, in seconds.
    pub tag_ttl_secs: u64,
    /// Remaining-TTL fraction below which a remote hit is queued for refresh.
    pub refresh_ahead_fraction: f64,
    /// Local expiry sweep interval, in seconds.
    pub sweep_interval_secs: u64,
    /// Statistics report interval, in seconds.
    pub stats_interval_secs: u64,
    /// Warmup queue drain interval, in seconds.
    pub warmup_interval_secs: u64,
    /// Circuit breaker guarding the remote layer.
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: 1000,
            local_ttl_cap_secs: 60,
            default_ttl_secs: 3600,
            tag_ttl_secs: 86_400,
            refresh_ahead_fraction: 0.2,
            sweep_interval_secs: 60,
            stats_interval_secs: 300,
            warmup_interval_secs: 30,
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

impl CacheConfig {
    /// Returns the local TTL cap as a Duration.
    #[must_use]
    pub const fn local_ttl_cap(&self) -> Duration {
        Duration::from_secs(self.local_ttl_cap_secs)
    }

    /// Returns the default entry TTL as a Duration.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Returns the tag index TTL as a Duration.
    #[must_use]
    pub const fn tag_ttl(&self) -> Duration {
        Duration::from_secs(self.tag_ttl_secs)
    }

    /// Returns the sweep interval as a Duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Returns the statistics report interval as a Duration.
    #[must_use]
    pub const fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Returns the warmup drain interval as a Duration.
    #[must_use]
    pub const fn warmup_interval(&self) -> Duration {
        Duration::from_secs(self.warmup_interval_secs)
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u64,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u64,
    /// Cooldown before an open circuit admits a trial call, in seconds.
    pub timeout_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout_secs: 60,
        }
    }
}

impl CircuitBreakerSettings {
    /// Returns the cooldown as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
