//! Single-writer command dispatcher
//!
//! One OS thread drains the request queue. For each request it locks the
//! store, applies the command, unlocks, appends successful mutations to the
//! command log and only then answers the caller. No two commands are ever
//! applied concurrently, and logged order equals applied order.

use crate::ErrorKind;
use crate::metrics::Metrics;
use crate::persistence::CommandLog;
use crate::protocol::{Command, Operation};
use crate::storage::{Reply, SharedStore};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace};

/// Message accepted by the dispatcher
#[derive(Debug)]
pub(crate) enum Request {
    /// Apply a command and answer on `reply`
    Apply {
        command: Command,
        reply: oneshot::Sender<Reply>,
    },
    /// Stop serving, close the log, then signal `done`
    Shutdown { done: oneshot::Sender<()> },
}

pub(crate) struct Dispatcher {
    store: SharedStore,
    log: Option<CommandLog>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub(crate) fn new(store: SharedStore, log: Option<CommandLog>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            log,
            metrics,
        }
    }

    /// Run the serve loop on a dedicated thread
    pub(crate) fn spawn(self, requests: mpsc::Receiver<Request>) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("cash-dispatcher".to_string())
            .spawn(move || self.run(requests))
    }

    fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        info!("Dispatcher started");
        let mut done = None;

        while let Some(request) = requests.blocking_recv() {
            match request {
                Request::Apply { command, reply } => {
                    let result = self.apply(&command);
                    if reply.send(result).is_err() {
                        debug!(command = %command, "Caller dropped before reply");
                    }
                }
                Request::Shutdown { done: signal } => {
                    done = Some(signal);
                    break;
                }
            }
        }

        // Anything still queued is dropped; those callers see the engine as stopped
        requests.close();

        if let Some(log) = self.log.take() {
            let path = log.path().to_path_buf();
            if let Err(e) = log.close() {
                error!(path = ?path, error = %e, "Failed to close command log");
            }
        }

        info!("Dispatcher stopped");
        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    /// Apply one command under the store lock, then persist it on success
    pub(crate) fn apply(&mut self, command: &Command) -> Reply {
        let start = Instant::now();
        let operation = command.operation();
        self.metrics.command_counter(operation).inc();

        let reply = self.store.lock().apply(command);

        match &reply {
            Ok(_) => {
                if operation == Operation::Get {
                    self.metrics.get_hits.inc();
                }
                if operation.is_mutating() {
                    self.persist(command);
                }
            }
            Err(e) => {
                self.metrics.request_errors.inc();
                match e.kind() {
                    ErrorKind::KeyExpired => {
                        self.metrics.expired_lazy.inc();
                        self.metrics.get_misses.inc();
                    }
                    ErrorKind::KeyNotFound => self.metrics.get_misses.inc(),
                    ErrorKind::InvalidRequest | ErrorKind::CompressionFailure => {}
                }
            }
        }

        self.metrics
            .cmd_latency
            .observe(start.elapsed().as_secs_f64());
        trace!(command = %command, ok = reply.is_ok(), "Command applied");

        reply
    }

    fn persist(&mut self, command: &Command) {
        let Some(log) = self.log.as_mut() else {
            return;
        };

        match log.append(command) {
            Ok(()) => self.metrics.log_appends.inc(),
            Err(e) => {
                // The store already changed; the caller still gets its success reply
                self.metrics.log_errors.inc();
                error!(
                    path = ?log.path(),
                    command = %command,
                    error = %e,
                    "Failed to append to command log"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SyncPolicy;
    use crate::storage::CacheStore;
    use tempfile::TempDir;

    fn dispatcher_with_log(tmp_dir: &TempDir) -> (Dispatcher, std::path::PathBuf) {
        let path = tmp_dir.path().join("cache.cashlog");
        let log = CommandLog::open(&path, SyncPolicy::Never).unwrap();
        let dispatcher = Dispatcher::new(
            CacheStore::new().into_shared(),
            Some(log),
            Arc::new(Metrics::new()),
        );
        (dispatcher, path)
    }

    #[test]
    fn test_only_successful_mutations_are_logged() {
        let tmp_dir = TempDir::new().unwrap();
        let (mut dispatcher, path) = dispatcher_with_log(&tmp_dir);

        dispatcher.apply(&Command::set("a", "1")).unwrap();
        dispatcher.apply(&Command::get("a")).unwrap();
        dispatcher.apply(&Command::get("missing")).unwrap_err();
        dispatcher
            .apply(&Command::new(Operation::Expires, ["a", "soon"]))
            .unwrap_err();
        dispatcher.apply(&Command::expires("a", 60)).unwrap();
        dispatcher.apply(&Command::delete("nope")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "SET a 1;\nEXPIRES a 60;\nDELETE nope;\n");
        assert_eq!(dispatcher.metrics.log_appends.get(), 3);
    }

    #[test]
    fn test_metrics_follow_replies() {
        let tmp_dir = TempDir::new().unwrap();
        let (mut dispatcher, _) = dispatcher_with_log(&tmp_dir);

        dispatcher.apply(&Command::set("a", "1")).unwrap();
        dispatcher.apply(&Command::get("a")).unwrap();
        dispatcher.apply(&Command::get("b")).unwrap_err();
        dispatcher.apply(&Command::expires("a", 0)).unwrap();
        dispatcher.apply(&Command::get("a")).unwrap_err();

        let metrics = &dispatcher.metrics;
        assert_eq!(metrics.cmd_get.get(), 3);
        assert_eq!(metrics.cmd_set.get(), 1);
        assert_eq!(metrics.cmd_expires.get(), 1);
        assert_eq!(metrics.get_hits.get(), 1);
        assert_eq!(metrics.get_misses.get(), 2);
        assert_eq!(metrics.expired_lazy.get(), 1);
        assert_eq!(metrics.request_errors.get(), 2);
    }

    #[test]
    fn test_without_log() {
        let mut dispatcher = Dispatcher::new(
            CacheStore::new().into_shared(),
            None,
            Arc::new(Metrics::new()),
        );
        assert_eq!(dispatcher.apply(&Command::set("a", "1")).unwrap(), "OK");
        assert_eq!(dispatcher.metrics.log_appends.get(), 0);
    }
}
