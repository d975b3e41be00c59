//! # Strata Resilience
//!
//! Resilience patterns guarding the remote cache layer.
//! Provides a circuit breaker and an operation timeout.

pub mod circuit_breaker;
pub mod timeout;

pub use circuit_breaker::*;
pub use timeout::*;
