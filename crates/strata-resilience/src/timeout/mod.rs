//! Timeout wrapper for async operations.

use std::time::Duration;
use strata_core::StrataError;

/// Wraps an async operation with a timeout.
///
/// An elapsed timeout surfaces as [`StrataError::Timeout`], which the
/// circuit breaker counts as a failure like any transport error.
pub async fn with_timeout<F, Fut, T>(duration: Duration, f: F) -> Result<T, StrataError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, StrataError>>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| StrataError::Timeout(format!("Operation timed out after {:?}", duration)))?
}
