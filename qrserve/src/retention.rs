//! Background deletion of stored files past their retention age.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RetentionConfig;
use crate::storage::{Area, Storage};

/// Runs one sweep over both storage areas and returns the number of files removed.
///
/// A failing area is logged and does not stop the other from being swept.
pub async fn sweep_once(storage: &Storage, max_age: Duration) -> usize {
    let mut removed = 0;
    for area in [Area::Generated, Area::Uploads] {
        match storage.sweep(area, max_age).await {
            Ok(count) => removed += count,
            Err(e) => error!(area = ?area, error = %e, "Retention sweep failed"),
        }
    }
    removed
}

/// Sweeps every `interval` until `shutdown` is cancelled. The first sweep runs immediately.
pub async fn run_sweeper(storage: Storage, max_age: Duration, interval: Duration, shutdown: CancellationToken) {
    info!(max_age = %humantime::format_duration(max_age), interval = %humantime::format_duration(interval), "Starting retention sweeper");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Retention sweeper shutting down");
                return;
            }
            _ = ticker.tick() => {
                let removed = sweep_once(&storage, max_age).await;
                if removed > 0 {
                    info!(removed, "Removed expired files");
                } else {
                    debug!("No expired files");
                }
            }
        }
    }
}

/// Spawns the sweeper if `retention.max_age` is set.
pub fn spawn_sweeper(storage: Storage, config: &RetentionConfig, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
    let max_age = config.max_age?;
    Some(tokio::spawn(run_sweeper(storage, max_age, config.sweep_interval, shutdown)))
}
