//! Server startup utilities.

use strata_config::AppConfig;
use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(r#"
   _____ __             __
  / ___// /__________ _/ /_____ _
  \__ \/ __/ ___/ __ `/ __/ __ `/
 ___/ / /_/ /  / /_/ / /_/ /_/ /
/____/\__/_/   \__,_/\__/\__,_/

        two-layer cache
    "#);
}

/// Prints the effective cache settings.
pub fn print_startup_info(config: &AppConfig) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Environment:   {}", config.app.environment);
    if config.redis.enabled {
        info!("Remote store:  {} (pool {})", config.redis.url, config.redis.pool_size);
    } else {
        info!("Remote store:  in-process memory");
    }
    info!("Key prefix:    {}", config.redis.key_prefix);
    info!(
        "Local layer:   {} entries, TTL cap {}s",
        config.cache.local_capacity, config.cache.local_ttl_cap_secs
    );
    if config.metrics.enabled {
        info!("Metrics:       http://{}/metrics", config.metrics.listen_addr);
    }
    info!("{}", separator);
}
