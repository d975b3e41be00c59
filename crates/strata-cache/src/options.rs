//! Per-call cache options.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strata_config::CacheConfig;

/// How a write reaches the cache and any backing persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Caller computes the value and stores it; the cache never loads.
    #[default]
    CacheAside,
    /// Persist through the hook first, then cache.
    WriteThrough,
    /// Cache first, persist through the hook in the background.
    WriteBehind,
    /// Cache-aside, plus queueing remote hits that are close to expiry.
    RefreshAhead,
}

impl CacheStrategy {
    /// Returns true if the strategy requires a persistence hook.
    #[must_use]
    pub const fn needs_persistence(&self) -> bool {
        matches!(self, Self::WriteThrough | Self::WriteBehind)
    }
}

/// Options for a single get or set.
///
/// Unset fields fall back to the manager's configuration when resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Entry lifetime in the remote layer.
    pub ttl: Option<Duration>,
    /// Write and refresh strategy.
    pub strategy: CacheStrategy,
    /// Tags the key is indexed under.
    pub tags: Vec<String>,
    /// Remaining-TTL fraction that triggers a refresh.
    pub refresh_ahead: Option<f64>,
}

impl CacheOptions {
    /// Options with every field at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the TTL.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the TTL in whole seconds.
    #[must_use]
    pub fn ttl_secs(self, secs: u64) -> Self {
        self.ttl(Duration::from_secs(secs))
    }

    /// Sets the strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Adds one tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds several tags.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the refresh-ahead fraction.
    #[must_use]
    pub fn refresh_ahead(mut self, fraction: f64) -> Self {
        self.refresh_ahead = Some(fraction);
        self
    }

    /// Applies configured defaults to unset fields.
    #[must_use]
    pub fn resolve(&self, config: &CacheConfig) -> ResolvedOptions {
        ResolvedOptions {
            ttl: self.ttl.unwrap_or_else(|| config.default_ttl()),
            strategy: self.strategy,
            tags: self.tags.clone(),
            refresh_ahead: self
                .refresh_ahead
                .unwrap_or(config.refresh_ahead_fraction)
                .clamp(0.0, 1.0),
        }
    }
}

/// [`CacheOptions`] with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub ttl: Duration,
    pub strategy: CacheStrategy,
    pub tags: Vec<String>,
    pub refresh_ahead: f64,
}

impl ResolvedOptions {
    /// Returns true if a remote hit with `remaining` lifetime should be refreshed.
    #[must_use]
    pub fn wants_refresh(&self, remaining: Duration) -> bool {
        if self.strategy != CacheStrategy::RefreshAhead || self.ttl.is_zero() {
            return false;
        }
        remaining.as_secs_f64() / self.ttl.as_secs_f64() < self.refresh_ahead
    }
}
