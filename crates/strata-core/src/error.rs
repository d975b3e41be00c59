//! Unified error types for all Strata crates.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for the Strata cache.
///
/// Most of these never reach application code: the cache manager converts
/// them into misses at its boundary. They exist so the layers underneath
/// can report what went wrong and so the circuit breaker can decide what
/// counts as a failure.
#[derive(Error, Debug)]
pub enum StrataError {
    // ============ Infrastructure Errors ============
    /// Remote store unreachable, pool exhausted or command rejected
    #[error("Transport error: {0}")]
    Transport(String),

    /// Stored payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Persistence hook failed for a write-through/write-behind write
    #[error("Persistence error for key '{key}': {message}")]
    Persistence { key: String, message: String },

    // ============ Resilience Errors ============
    /// Circuit breaker open
    #[error("Service unavailable: circuit breaker open for {0}")]
    CircuitBreakerOpen(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ============ Misuse ============
    /// Flush attempted in an environment where it is forbidden
    #[error("Cache flush is forbidden in the {0} environment")]
    FlushForbidden(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StrataError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::CircuitBreakerOpen(_) => "CIRCUIT_BREAKER_OPEN",
            Self::Timeout(_) => "TIMEOUT",
            Self::FlushForbidden(_) => "FLUSH_FORBIDDEN",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a persistence error for a key.
    #[must_use]
    pub fn persistence<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Persistence {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error should trip the circuit breaker.
    ///
    /// Only failures of the remote store itself count. A corrupt payload
    /// says nothing about the health of the connection.
    #[must_use]
    pub const fn should_trip_circuit_breaker(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Connection-level failures are transport errors. A command the server
/// answered with an error reply (`WRONGTYPE` and the like) is a cache error
/// and leaves the circuit breaker alone.
#[cfg(feature = "redis")]
impl From<redis::RedisError> for StrataError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_io_error() || err.is_cluster_error() {
            Self::Transport(err.to_string())
        } else {
            Self::Cache(format!("Redis rejected command: {}", err))
        }
    }
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::PoolError> for StrataError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Transport(format!("Failed to get Redis connection: {}", err))
    }
}
