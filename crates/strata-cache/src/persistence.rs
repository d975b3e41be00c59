//! Persistence hook for write-through and write-behind strategies.

use async_trait::async_trait;
use strata_core::StrataResult;

/// Durable store that cache writes are mirrored to.
///
/// Registered on the manager builder. Without one, write-through and
/// write-behind writes are refused.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceHook: Send + Sync {
    /// Persist the value for a key.
    async fn write(&self, key: &str, value: &serde_json::Value) -> StrataResult<()>;
}
