//! Retention pruning of raw readings.
//!
//! The cutoff is always the latest hour committed into the rollup
//! table, never the wall clock: a failed or delayed rollup simply moves
//! the cutoff back, so raw data that has not been aggregated can never
//! be deleted.

use tracing::info;

use crate::error::Result;
use crate::store::Store;

// ---

/// Deletes raw readings that are safely represented by a rollup row.
pub struct RetentionPruner {
    store: Store,
}

impl RetentionPruner {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Delete raw readings strictly older than the latest rolled-up
    /// hour. No rollup rows yet means nothing is safely summarized, so
    /// nothing is deleted.
    ///
    /// Returns the number of rows removed.
    pub async fn prune(&self) -> Result<u64> {
        // ---
        let Some(cutoff) = self.store.latest_hour_bucket().await? else {
            info!("No rollup rows yet; skipping prune");
            return Ok(0);
        };

        let deleted = self.store.delete_readings_before(cutoff).await?;
        info!("Deleted {} raw readings older than {}", deleted, cutoff);

        Ok(deleted)
    }
}
