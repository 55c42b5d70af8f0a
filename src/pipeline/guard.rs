//! Daily idempotency guard for the rollup pipeline.
//!
//! The scheduler fires both at process startup and at the daily trigger;
//! a restart close to midnight would otherwise run the pipeline twice in
//! one day, double-publishing the device reset. The guard makes the
//! check-then-record step one logical operation for this process: an
//! async mutex serializes concurrent firings, and the store's unique
//! run_date constraint backs the record. Cross-process exclusion is not
//! provided — run one scheduler instance.

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::store::Store;

// ---

/// Allows the pipeline to run at most once per calendar day.
pub struct IdempotencyGuard {
    // ---
    store: Store,
    lock: Mutex<()>,
}

impl IdempotencyGuard {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Whether the pipeline should run for `today`.
    ///
    /// Returns false without side effects when today's marker already
    /// exists. Otherwise records the marker and returns true — the day
    /// is claimed before the side-effecting stages run, so a failed run
    /// waits for the next calendar day rather than risking a double
    /// reset publish.
    pub async fn should_run(&self, today: NaiveDate) -> Result<bool> {
        // ---
        let _held = self.lock.lock().await;

        if let Some(marker) = self.store.latest_run_marker().await? {
            if marker.run_date == today {
                debug!(
                    "Rollup already recorded for {} at {}",
                    today, marker.recorded_at
                );
                return Ok(false);
            }
        }

        self.store.record_run(today).await?;
        Ok(true)
    }
}
