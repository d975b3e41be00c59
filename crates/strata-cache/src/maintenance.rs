//! Background maintenance tasks.
//!
//! Three independent loops run on their own intervals: the local expiry
//! sweep, the statistics report and the warmup queue drain. They hold a
//! weak reference to the manager and stop when it is dropped or when the
//! handle is shut down.

use crate::manager::CacheManager;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use strata_config::CacheConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Handle to the running maintenance tasks.
pub struct MaintenanceHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub(crate) fn spawn(manager: Weak<CacheManager>, config: &CacheConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut tasks = Vec::with_capacity(3);

        let schedule = [
            ("sweep", config.sweep_interval()),
            ("stats", config.stats_interval()),
            ("warmup", config.warmup_interval()),
        ];
        for (name, period) in schedule {
            if period.is_zero() {
                warn!(task = name, "Maintenance interval is zero, task disabled");
                continue;
            }

            let manager = manager.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            let task = match name {
                "sweep" => run_every(name, period, manager, shutdown_rx, |m| async move {
                    m.sweep_local();
                }),
                "stats" => run_every(name, period, manager, shutdown_rx, |m| async move {
                    m.report_stats();
                }),
                _ => run_every(name, period, manager, shutdown_rx, |m| async move {
                    m.drain_warmup().await;
                }),
            };
            tasks.push(task);
        }

        info!(tasks = tasks.len(), "Cache maintenance started");
        Self { shutdown_tx, tasks }
    }

    /// Returns true while at least one task is still running.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Signals every task to stop and waits for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Maintenance task ended abnormally");
            }
        }
        info!("Cache maintenance stopped");
    }
}

fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    manager: Weak<CacheManager>,
    mut shutdown_rx: broadcast::Receiver<()>,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<CacheManager>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        // First run one full period after start.
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(task = name, "Maintenance task received shutdown signal");
                    break;
                }

                _ = interval.tick() => {
                    let Some(manager) = manager.upgrade() else {
                        debug!(task = name, "Cache manager dropped, stopping maintenance task");
                        break;
                    };
                    tick(manager).await;
                }
            }
        }
    })
}
