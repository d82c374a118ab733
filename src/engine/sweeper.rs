//! Expiration sweeper
//!
//! Background task that periodically evicts keys whose TTL has passed,
//! independent of reads. It takes the same store lock as the dispatcher.

use crate::metrics::Metrics;
use crate::storage::SharedStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Spawns the sweeper on the current Tokio runtime.
///
/// The task runs until `cancel` fires.
pub(crate) fn spawn(
    store: SharedStore,
    interval: Duration,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting expiration sweeper"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    let removed = sweep(&store, Instant::now());
                    if removed > 0 {
                        metrics.expired_swept.inc_by(removed as u64);
                        debug!(removed, "Sweep: removed expired keys");
                    } else {
                        trace!("Sweep: no expired keys");
                    }
                }
            }
        }

        info!("Expiration sweeper stopped");
    })
}

/// Run one sweep pass under the store lock
pub(crate) fn sweep(store: &SharedStore, now: Instant) -> usize {
    store.lock().sweep_expired(now)
}
