//! Process wiring for the cache.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use strata_cache::{register_metrics, CacheManager, MemoryStore, RedisStore, RemoteStore};
use strata_config::{AppConfig, MetricsConfig, RedisConfig};
use strata_core::{StrataError, StrataResult};
use tokio::signal;
use tracing::{error, info, warn};

/// Builds the remote store selected by configuration.
///
/// With Redis disabled the cache runs against an in-process store, which
/// gives a single-process deployment the same API without a server.
pub fn build_store(config: &RedisConfig) -> StrataResult<Arc<dyn RemoteStore>> {
    if config.enabled {
        Ok(Arc::new(RedisStore::from_config(config)?))
    } else {
        warn!("Redis disabled, using in-process remote store");
        Ok(Arc::new(MemoryStore::new()))
    }
}

/// Builds the process-wide cache manager.
pub fn build_manager(config: &AppConfig) -> StrataResult<Arc<CacheManager>> {
    let store = build_store(&config.redis)?;
    let manager = CacheManager::from_app_config(store, config).build();
    Ok(Arc::new(manager))
}

/// Installs the Prometheus recorder and scrape endpoint when enabled.
///
/// Returns whether an exporter was installed.
pub fn install_metrics_exporter(config: &MetricsConfig) -> StrataResult<bool> {
    if !config.enabled {
        return Ok(false);
    }

    let addr: SocketAddr = config.listen_addr.parse().map_err(|e| {
        StrataError::Configuration(format!("Invalid metrics address '{}': {}", config.listen_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| StrataError::Internal(format!("Failed to install Prometheus exporter: {}", e)))?;

    register_metrics();
    info!(%addr, "Prometheus exporter listening");
    Ok(true)
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_cache::{CacheOptions, CircuitState};
    use strata_config::Environment;

    fn in_memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.redis.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_manager_runs_on_memory_store_when_redis_disabled() {
        let manager = build_manager(&in_memory_config()).unwrap();

        assert!(manager.health_check().await);
        assert!(manager.set("greeting", &"hello", &CacheOptions::new()).await);
        assert_eq!(
            manager.get::<String>("greeting", &CacheOptions::new()).await.as_deref(),
            Some("hello")
        );
        assert_eq!(manager.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_manager_takes_environment_and_tuning_from_config() {
        let mut config = in_memory_config();
        config.app.environment = Environment::Production;
        config.cache.local_capacity = 2;

        let manager = build_manager(&config).unwrap();
        assert_eq!(manager.environment(), Environment::Production);
        assert_eq!(manager.config().local_capacity, 2);
        assert!(manager.flush().await.is_err());
    }

    #[tokio::test]
    async fn test_bad_redis_url_fails_startup() {
        let mut config = AppConfig::default();
        config.redis.url = "not a url".to_string();
        assert!(build_store(&config.redis).is_err());
    }

    #[test]
    fn test_metrics_disabled_installs_nothing() {
        assert!(!install_metrics_exporter(&MetricsConfig::default()).unwrap());
    }

    #[test]
    fn test_metrics_bad_address() {
        let config = MetricsConfig {
            enabled: true,
            listen_addr: "nowhere".to_string(),
        };
        assert!(matches!(
            install_metrics_exporter(&config),
            Err(StrataError::Configuration(_))
        ));
    }
}
