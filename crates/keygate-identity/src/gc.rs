//! Supervised background reclamation of expired and stale records.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::IdentityError;

/// A source of dead rows the garbage collector can reclaim.
#[async_trait]
pub trait Purger: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Delete dead rows, returning how many were removed.
    async fn purge(&self) -> Result<u64, IdentityError>;
}

/// Backoff applied after the first failure following a healthy run.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on the failure backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Runs every registered purger on a fixed interval, backing off while
/// any purger is failing.
///
/// Purger errors never propagate anywhere: the collector has no caller
/// to report to, so it logs and adjusts its own schedule. A purge may
/// race with live traffic on the same rows; the stores are written so
/// either ordering is sound.
pub struct GarbageCollector {
    interval: Duration,
    purgers: Vec<Arc<dyn Purger>>,
}

impl GarbageCollector {
    /// Create a collector that wakes every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            purgers: Vec::new(),
        }
    }

    /// Register a purger. Purgers run sequentially in registration
    /// order.
    #[must_use]
    pub fn with_purger(mut self, purger: Arc<dyn Purger>) -> Self {
        self.purgers.push(purger);
        self
    }

    /// Run the collection loop until `cancel` flips to true. Should be
    /// spawned as a background task via `tokio::spawn`.
    ///
    /// After a failed round, the next wait is one second, then doubles
    /// on every further failure up to a one minute cap. The first
    /// successful round resets the wait to the configured interval.
    pub async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            purgers = self.purgers.len(),
            "Garbage collector started"
        );

        let mut next = self.interval;
        let mut healthy = true;

        loop {
            if *cancel.borrow() {
                info!("Garbage collector received cancel signal, shutting down");
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(next) => {}
                changed = cancel.changed() => {
                    if changed.is_err() {
                        info!("Garbage collector cancel channel closed, shutting down");
                        break;
                    }
                    continue;
                }
            }

            let mut failed = false;
            for purger in &self.purgers {
                if let Err(e) = purger.purge().await {
                    error!(purger = purger.name(), error = %e, "Purge failed");
                    failed = true;
                }
            }

            if failed {
                next = if healthy {
                    INITIAL_BACKOFF
                } else {
                    cmp::min(next * 2, MAX_BACKOFF)
                };
                healthy = false;
                info!(retry_secs = next.as_secs(), "Retrying purge after backoff");
            } else {
                if !healthy {
                    info!("Purgers recovered");
                }
                healthy = true;
                next = self.interval;
            }
        }
    }
}
