//! Configuration validation module.
//!
//! Fails fast on invalid configuration rather than at runtime.

use crate::AppConfig;
use std::fmt;
use std::net::SocketAddr;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Local cache capacity must hold at least one entry.
    ZeroCapacity,
    /// Refresh-ahead fraction must be between 0.0 and 1.0.
    InvalidRefreshFraction { value: f64 },
    /// A threshold must be positive.
    ZeroThreshold { name: String },
    /// An interval or timeout must be positive.
    NonPositiveDuration { name: String },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Pool size is out of range.
    InvalidPoolSize { value: usize, maximum: usize },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "Local cache capacity must be at least 1"),
            Self::InvalidRefreshFraction { value } => {
                write!(
                    f,
                    "Invalid refresh-ahead fraction: {} (must be between 0.0 and 1.0)",
                    value
                )
            }
            Self::ZeroThreshold { name } => write!(f, "Threshold '{}' must be positive", name),
            Self::NonPositiveDuration { name } => {
                write!(f, "Duration '{}' must be positive", name)
            }
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::InvalidPoolSize { value, maximum } => {
                write!(f, "Pool size {} must be between 1 and {}", value, maximum)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: usize = 1000;

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_redis(&config.redis, &mut errors);
        Self::validate_cache(&config.cache, &mut errors);
        Self::validate_metrics(&config.metrics, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_redis(config: &crate::RedisConfig, errors: &mut Vec<ConfigValidationError>) {
        if !config.enabled {
            return;
        }

        if config.url.is_empty() {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: "URL is required when Redis is enabled".to_string(),
            });
        } else if !config.url.starts_with("redis://") && !config.url.starts_with("rediss://") {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: "URL must start with redis:// or rediss://".to_string(),
            });
        }

        if config.pool_size == 0 || config.pool_size > Self::MAX_POOL_SIZE {
            errors.push(ConfigValidationError::InvalidPoolSize {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }

        if config.command_timeout_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "redis.command_timeout_ms".to_string(),
            });
        }
    }

    fn validate_metrics(config: &crate::MetricsConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.enabled && config.listen_addr.parse::<SocketAddr>().is_err() {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "metrics".to_string(),
                message: format!("'{}' is not a socket address", config.listen_addr),
            });
        }
    }

    fn validate_cache(config: &crate::CacheConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.local_capacity == 0 {
            errors.push(ConfigValidationError::ZeroCapacity);
        }

        if !(0.0..=1.0).contains(&config.refresh_ahead_fraction) {
            errors.push(ConfigValidationError::InvalidRefreshFraction {
                value: config.refresh_ahead_fraction,
            });
        }

        let durations = [
            ("cache.local_ttl_cap_secs", config.local_ttl_cap_secs),
            ("cache.default_ttl_secs", config.default_ttl_secs),
            ("cache.tag_ttl_secs", config.tag_ttl_secs),
            ("cache.sweep_interval_secs", config.sweep_interval_secs),
            ("cache.stats_interval_secs", config.stats_interval_secs),
            ("cache.warmup_interval_secs", config.warmup_interval_secs),
            ("cache.circuit_breaker.timeout_secs", config.circuit_breaker.timeout_secs),
        ];
        for (name, value) in durations {
            if value == 0 {
                errors.push(ConfigValidationError::NonPositiveDuration {
                    name: name.to_string(),
                });
            }
        }

        let thresholds = [
            ("failure_threshold", config.circuit_breaker.failure_threshold),
            ("success_threshold", config.circuit_breaker.success_threshold),
        ];
        for (name, value) in thresholds {
            if value == 0 {
                errors.push(ConfigValidationError::ZeroThreshold {
                    name: name.to_string(),
                });
            }
        }
    }
}

/// Formats validation errors for display.
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}
