//! Cache engine: startup replay, single-writer dispatch and background expiry
//!
//! ```text
//!  callers ──submit──▶ [bounded queue] ──▶ dispatcher thread ──lock──▶ CacheStore
//!     ▲                                        │                          ▲
//!     └──────────── oneshot reply ◀────────────┤                          │
//!                                              └──▶ CommandLog       sweeper task
//! ```

mod dispatcher;
mod sweeper;

use crate::config::EngineConfig;
use crate::metrics::Metrics;
use crate::persistence::{CommandLog, ReplayStats, replay};
use crate::protocol::Command;
use crate::storage::{CacheStore, Reply, SharedStore};
use crate::{CashError, Result};
use dispatcher::{Dispatcher, Request};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct Engine {
    requests: mpsc::Sender<Request>,
    store: SharedStore,
    sweeper_cancel: CancellationToken,
}

impl Engine {
    /// Open and replay the command log, then start the sweeper and the dispatcher.
    ///
    /// Must be called from within a Tokio runtime. Failing to open or read the
    /// configured log is fatal; bad records inside it are not.
    pub fn start(
        config: &EngineConfig,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Result<(Self, ReplayStats)> {
        let mut store = CacheStore::new();
        let mut stats = ReplayStats::default();

        let log = match &config.log_path {
            Some(path) => {
                let persistence_error = |source| CashError::Persistence {
                    path: path.clone(),
                    source,
                };
                let mut log =
                    CommandLog::open(path, config.sync_policy).map_err(persistence_error)?;
                let contents = log.read_contents().map_err(persistence_error)?;

                stats = replay(&mut store, &contents);
                metrics.replayed_commands.inc_by(stats.applied as u64);
                metrics.replay_errors.inc_by(stats.errors() as u64);
                Some(log)
            }
            None => {
                info!("Persistence disabled, starting with an empty store");
                None
            }
        };

        let store = store.into_shared();
        let (requests, inbox) = mpsc::channel(config.queue_capacity.max(1));

        let sweeper_cancel = cancel.child_token();
        sweeper::spawn(
            Arc::clone(&store),
            config.sweep_interval(),
            Arc::clone(&metrics),
            sweeper_cancel.clone(),
        );

        Dispatcher::new(Arc::clone(&store), log, metrics)
            .spawn(inbox)
            .inspect_err(|_| sweeper_cancel.cancel())?;

        Ok((
            Self {
                requests,
                store,
                sweeper_cancel,
            },
            stats,
        ))
    }

    /// Submit a command and wait for its reply.
    ///
    /// Safe for any number of concurrent callers: each reply travels on its
    /// own channel.
    pub async fn submit(&self, command: Command) -> Result<Reply> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Apply { command, reply })
            .await
            .map_err(|_| CashError::EngineStopped)?;
        response.await.map_err(|_| CashError::EngineStopped)
    }

    /// Stop the sweeper and the dispatcher and close the command log.
    ///
    /// Commands queued before this call are still applied. Calling it again
    /// is a no-op.
    pub async fn shutdown(&self) {
        self.sweeper_cancel.cancel();

        let (done, stopped) = oneshot::channel();
        if self.requests.send(Request::Shutdown { done }).await.is_ok() {
            let _ = stopped.await;
            info!("Engine stopped");
        }
    }

    /// Number of keys currently holding a value
    pub fn key_count(&self) -> usize {
        self.store.lock().len()
    }

    /// Returns true once the dispatcher has stopped
    pub fn is_stopped(&self) -> bool {
        self.requests.is_closed()
    }

    /// Resolves once the dispatcher has stopped taking requests
    pub async fn stopped(&self) {
        self.requests.closed().await;
    }
}
