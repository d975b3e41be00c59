//! # Strata Server Library
//!
//! Wiring for the cache process: choosing the remote store, building the
//! cache manager from configuration, installing the metrics exporter and
//! waiting for a shutdown signal.

pub mod bootstrap;
pub mod startup;
