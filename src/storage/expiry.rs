//! Background Expiry Sweeper
//!
//! This module implements a background task that periodically moves expired
//! entries into the tombstone table. This is "active expiry", as opposed to
//! the "lazy expiry" reads perform on the keys they touch.
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry only sees keys that are read. A key that expires and is never
//! read again would otherwise sit in the live map forever.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Waits for the configured interval
//! 2. Calls [`Store::sweep`], which scans every entry under one exclusive lock
//! 3. Logs how many entries it tombstoned
//!
//! Stopping is one-way: once [`ExpirySweeper::stop`] has been called (or the
//! handle dropped) no further sweep starts, and there is no way to restart it.

use crate::storage::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// Shortest interval the sweeper will tick at
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// Set by the first `stop` call
    stopped: AtomicBool,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// # Arguments
    ///
    /// * `store` - The store to sweep
    /// * `interval` - Time between sweeps
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tempokv::{ExpirySweeper, Store, StoreConfig};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let store = Arc::new(Store::new(StoreConfig::default()));
    /// let sweeper = ExpirySweeper::start(Arc::clone(&store), Duration::from_secs(1));
    ///
    /// // Sweeper runs in the background...
    ///
    /// sweeper.stop();
    /// ```
    pub fn start(store: Arc<Store>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = interval.max(MIN_INTERVAL);

        tokio::spawn(sweeper_loop(store, interval, shutdown_rx));

        info!(
            interval_ms = interval.as_millis(),
            "Background expiry sweeper started"
        );

        Self {
            shutdown_tx,
            stopped: AtomicBool::new(false),
        }
    }

    /// Stops the expiry sweeper.
    ///
    /// Calling this more than once is a no-op. This is called automatically
    /// when the handle is dropped.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // The task may already be gone; nothing left to stop then.
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry sweeper stopped");
    }

    /// Returns true once `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    store: Arc<Store>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; wait a full interval instead.
    ticker.tick().await;

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        // A stop may land in the same instant as a tick
        if *shutdown_rx.borrow() {
            debug!("Expiry sweeper received shutdown signal");
            return;
        }

        let expired = store.sweep();

        if expired > 0 {
            debug!(
                expired = expired,
                entries_remaining = store.len(),
                "Expired entries tombstoned"
            );
        } else {
            trace!("Sweep found nothing to expire");
        }
    }
}
