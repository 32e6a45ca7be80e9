//! Background Persister
//!
//! The persister is a Tokio task that wakes on its own fixed interval,
//! independent of the sweeper's, and runs one [`persist_pending`] cycle.
//! Cycles do blocking file I/O while holding the store's write lock, so they
//! run on the blocking thread pool rather than on a runtime worker.
//!
//! ## Failures
//!
//! A failed cycle is logged, counted, and parked. The entries it could not
//! write stay unpersisted and are picked up again on the next tick. The
//! parked error is handed to the caller by [`Persister::take_error`] or, if
//! nobody took it, by [`Persister::stop`].

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::persistence::log::{persist_pending, PersistError, PersistResult};
use crate::storage::Store;

/// Default interval between persistence cycles.
pub const DEFAULT_PERSIST_INTERVAL: Duration = Duration::from_secs(3);

/// Shortest interval the persister will run at. Shorter ones are raised to it.
pub const MIN_PERSIST_INTERVAL: Duration = Duration::from_millis(1);

/// Default location of the append log.
pub const DEFAULT_LOG_PATH: &str = "data/current.log";

/// Configuration for the persister.
#[derive(Debug, Clone)]
pub struct PersisterConfig {
    /// Interval between cycles (default: 3s)
    pub interval: Duration,

    /// Append log destination (default: `data/current.log`)
    pub log_path: PathBuf,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PERSIST_INTERVAL,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
        }
    }
}

impl PersisterConfig {
    /// Sets the interval between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the append log destination.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }
}

/// Totals reported by a persister when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Cycles run, successful or not
    pub cycles: u64,
    /// Records appended across all cycles
    pub records: u64,
    /// Cycles that failed
    pub failures: u64,
}

/// A handle to the running persister.
#[derive(Debug)]
pub struct Persister {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<PersistStats>>,

    /// Most recent failure not yet handed to the caller
    last_error: Arc<Mutex<Option<PersistError>>>,
}

impl Persister {
    /// Starts the persister as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(store: Arc<Store>, mut config: PersisterConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        config.interval = config.interval.max(MIN_PERSIST_INTERVAL);
        let last_error = Arc::new(Mutex::new(None));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            path = %config.log_path.display(),
            "Background persister started"
        );

        let task = tokio::spawn(persister_loop(
            store,
            config,
            shutdown_rx,
            Arc::clone(&last_error),
        ));

        Self {
            shutdown_tx,
            task: Some(task),
            last_error,
        }
    }

    /// Takes the most recent cycle failure, if any.
    pub fn take_error(&self) -> Option<PersistError> {
        self.last_error.lock().take()
    }

    /// Stops the persister and waits for its task to exit.
    ///
    /// A cycle in progress finishes first; once this returns no further
    /// writes to the log will happen. Returns an error if the task panicked
    /// or if a cycle failure is still pending.
    pub async fn stop(mut self) -> PersistResult<PersistStats> {
        let _ = self.shutdown_tx.send(true);

        let stats = match self.task.take() {
            Some(task) => task.await?,
            None => PersistStats::default(),
        };

        info!(
            cycles = stats.cycles,
            records = stats.records,
            failures = stats.failures,
            "Background persister stopped"
        );

        match self.take_error() {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Returns true while the background task has not exited.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.shutdown_tx.send(true);
            debug!("Persister handle dropped without stop()");
        }
    }
}

/// The main persister loop.
async fn persister_loop(
    store: Arc<Store>,
    config: PersisterConfig,
    mut shutdown_rx: watch::Receiver<bool>,
    last_error: Arc<Mutex<Option<PersistError>>>,
) -> PersistStats {
    let mut stats = PersistStats::default();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Persister received shutdown signal");
                    return stats;
                }
            }
        }

        let cycle_store = Arc::clone(&store);
        let path = config.log_path.clone();
        let result = tokio::task::spawn_blocking(move || persist_pending(&cycle_store, &path))
            .await
            .unwrap_or_else(|e| Err(PersistError::Task(e)));

        stats.cycles += 1;
        match result {
            Ok(0) => trace!("Nothing pending to persist"),
            Ok(records) => {
                stats.records += records as u64;
                debug!(records, "Persist cycle complete");
            }
            Err(e) => {
                stats.failures += 1;
                error!(error = %e, "Persist cycle failed");
                *last_error.lock() = Some(e);
            }
        }
    }
}
