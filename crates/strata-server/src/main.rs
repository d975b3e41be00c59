//! # Strata Server
//!
//! Runs one cache manager for the process: loads configuration, sets up
//! logging and metrics, starts background maintenance and shuts down
//! cleanly on Ctrl+C or SIGTERM.

use strata_config::ConfigLoader;
use strata_core::{init_tracing, StrataResult};
use strata_server::bootstrap::{build_manager, install_metrics_exporter, shutdown_signal};
use strata_server::startup::{print_banner, print_startup_info};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Application error: {}", e);
        eprintln!("strata-server: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> StrataResult<()> {
    let config_loader = ConfigLoader::from_default_location()?;
    let config = config_loader.get().await;

    init_tracing(&config.logging)?;
    print_banner();
    info!("Starting Strata cache server...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    install_metrics_exporter(&config.metrics)?;

    let manager = build_manager(&config)?;
    if manager.health_check().await {
        info!("Remote store reachable");
    } else {
        warn!("Remote store unreachable, serving from the local layer until it recovers");
    }

    manager.start_maintenance();
    print_startup_info(&config);

    shutdown_signal().await;

    let stats = manager.report_stats();
    manager.disconnect().await;
    info!(hits = stats.hits, misses = stats.misses, "Server shutdown complete");
    Ok(())
}
