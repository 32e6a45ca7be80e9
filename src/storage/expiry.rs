//! Background Expiry Sweeper
//!
//! Entries are never checked for expiry on access: a `fetch` returns whatever
//! is in the map. Reclaiming timed-out entries is the job of the sweeper, a
//! Tokio task that wakes on a fixed interval and asks the store to evict
//! everything whose absolute expiry has passed.
//!
//! ## Stopping
//!
//! The stop signal is only looked at between ticks, so a sweep that has
//! already started always runs to completion. [`Sweeper::stop`] sends the
//! signal and then waits for the task itself to finish, so once it returns
//! the task no longer holds a reference to the store.

use crate::storage::Store;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, trace};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest interval the sweeper will run at. Shorter ones are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between sweeps (default: 1s)
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl SweeperConfig {
    /// Sets the interval between sweeps.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Totals reported by a sweeper when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Number of sweeps performed
    pub ticks: u64,
    /// Number of entries evicted across all sweeps
    pub evicted: u64,
}

/// A handle to the running expiry sweeper.
///
/// Call [`Sweeper::stop`] to shut it down and wait for it. Dropping the
/// handle also signals the task to stop, but does not wait.
#[derive(Debug)]
pub struct Sweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// The background task
    task: Option<JoinHandle<SweepStats>>,
}

impl Sweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ttlkv::storage::{Store, Sweeper, SweeperConfig};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(Store::new());
    /// let sweeper = Sweeper::start(Arc::clone(&store), SweeperConfig::default());
    ///
    /// // Sweeper runs in the background...
    ///
    /// let stats = sweeper.stop().await?;
    /// ```
    pub fn start(store: Arc<Store>, mut config: SweeperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        config.interval = config.interval.max(MIN_SWEEP_INTERVAL);

        let interval_ms = config.interval.as_millis() as u64;
        let task = tokio::spawn(sweeper_loop(store, config, shutdown_rx));

        info!(interval_ms, "Background expiry sweeper started");

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Stops the sweeper and waits for its task to exit.
    ///
    /// A sweep in progress finishes first. Returns the sweeper's totals, or
    /// the join error if the task panicked.
    pub async fn stop(mut self) -> Result<SweepStats, JoinError> {
        let _ = self.shutdown_tx.send(true);

        let stats = match self.task.take() {
            Some(task) => task.await?,
            None => SweepStats::default(),
        };

        info!(
            ticks = stats.ticks,
            evicted = stats.evicted,
            "Background expiry sweeper stopped"
        );
        Ok(stats)
    }

    /// Returns true while the background task has not exited.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.shutdown_tx.send(true);
            debug!("Expiry sweeper handle dropped without stop()");
        }
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    store: Arc<Store>,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> SweepStats {
    let mut stats = SweepStats::default();

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return stats;
                }
            }
        }

        let evicted = store.sweep_expired(SystemTime::now());
        stats.ticks += 1;
        stats.evicted += evicted as u64;

        if evicted > 0 {
            debug!(
                evicted = evicted,
                keys_remaining = store.len(),
                "Expired entries evicted"
            );
        } else {
            trace!("Sweep found nothing to evict");
        }
    }
}
