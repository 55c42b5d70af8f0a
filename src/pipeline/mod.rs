//! Rollup & retention pipeline.
//!
//! One scheduled unit of work per calendar day: guard check, best-effort
//! device-reset publish, hourly rollup, then retention prune. Stages run
//! strictly in sequence — the prune cutoff depends on the rollup having
//! committed — and any aggregate/prune failure ends the run; the next
//! scheduled firing is the retry point. The scheduler is the only thing
//! that knows about wall-clock time: both its trigger sites call
//! [`RollupPipeline::run`] with the date computed at fire time, which
//! keeps the pipeline testable without real timers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

mod aggregator;
mod guard;
mod pruner;

pub use aggregator::Aggregator;
pub use guard::IdempotencyGuard;
pub use pruner::RetentionPruner;

use crate::error::{Error, Result};
use crate::models::Interval;
use crate::notify::ResetNotifier;
use crate::store::Store;

// ---

/// Terminal state of one pipeline firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The guard found today's run already recorded.
    Skipped,
    /// All stages completed.
    Completed { aggregated: usize, pruned: u64 },
}

/// Orchestrates guard → notify → aggregate → prune as one unit of work.
pub struct RollupPipeline {
    // ---
    guard: IdempotencyGuard,
    aggregator: Aggregator,
    pruner: RetentionPruner,
    notifier: ResetNotifier,
    stage_timeout: Duration,
}

impl RollupPipeline {
    /// Build the pipeline over the store handle reserved for pipeline
    /// writes (never the read-path pool).
    pub fn new(store: Store, notifier: ResetNotifier, stage_timeout: Duration) -> Self {
        // ---
        Self {
            guard: IdempotencyGuard::new(store.clone()),
            aggregator: Aggregator::new(store.clone()),
            pruner: RetentionPruner::new(store),
            notifier,
            stage_timeout,
        }
    }

    /// Execute one firing for `today`.
    ///
    /// Errors from the guard, rollup, or prune stages surface here and
    /// stop the run; they are not retried within the same firing. The
    /// reset publish shares the daily trigger for operational
    /// convenience only — its failure is logged and swallowed.
    pub async fn run(&self, today: NaiveDate) -> Result<RunOutcome> {
        // ---
        if !self.guard.should_run(today).await? {
            return Ok(RunOutcome::Skipped);
        }

        if let Err(e) = self.bounded(self.notifier.publish_reset()).await {
            warn!("Reset notification failed (continuing): {}", e);
        }

        let aggregated = self.bounded(self.aggregator.rollup(Interval::Hour)).await?;
        let pruned = self.bounded(self.pruner.prune()).await?;

        info!(
            "Rollup run for {} complete: {} aggregates written, {} raw rows pruned",
            today, aggregated, pruned
        );
        Ok(RunOutcome::Completed { aggregated, pruned })
    }

    /// Bound a stage by the configured timeout; elapse is transient.
    async fn bounded<T>(&self, stage: impl Future<Output = Result<T>>) -> Result<T> {
        // ---
        timeout(self.stage_timeout, stage)
            .await
            .unwrap_or(Err(Error::Timeout(self.stage_timeout)))
    }
}

// ---

/// Fires the pipeline once at startup and then daily at the configured
/// UTC hour.
pub struct Scheduler {
    // ---
    pipeline: Arc<RollupPipeline>,
    rollup_hour: u32,
}

impl Scheduler {
    pub fn new(pipeline: Arc<RollupPipeline>, rollup_hour: u32) -> Self {
        Self {
            pipeline,
            rollup_hour,
        }
    }

    /// Spawn the scheduling task.
    ///
    /// The immediate firing covers a process that was down at the daily
    /// trigger; the guard keeps the pair of trigger sites to at most one
    /// substantive run per day. Returns a handle that can abort the
    /// task.
    pub fn start(self) -> JoinHandle<()> {
        // ---
        info!(
            "Starting rollup scheduler (daily at {:02}:00 UTC, plus one run now)",
            self.rollup_hour
        );

        tokio::spawn(async move {
            self.fire("startup").await;

            loop {
                let wait = until_next_run(Utc::now(), self.rollup_hour);
                tokio::time::sleep(wait).await;
                self.fire("daily").await;
            }
        })
    }

    async fn fire(&self, trigger: &str) {
        // ---
        let today = Utc::now().date_naive();
        match self.pipeline.run(today).await {
            Ok(RunOutcome::Skipped) => {
                info!("[{}] rollup already ran for {}; skipped", trigger, today);
            }
            Ok(RunOutcome::Completed { aggregated, pruned }) => {
                info!(
                    "[{}] rollup for {} done ({} aggregates, {} pruned)",
                    trigger, today, aggregated, pruned
                );
            }
            Err(e) if e.is_transient() => {
                error!(
                    "[{}] rollup pipeline failed for {}: {}; next scheduled firing is the retry point",
                    trigger, today, e
                );
            }
            Err(e) => {
                error!("[{}] rollup pipeline failed for {}: {}", trigger, today, e);
            }
        }
    }
}

/// Time until the next daily firing at `rollup_hour` UTC.
fn until_next_run(now: DateTime<Utc>, rollup_hour: u32) -> Duration {
    // ---
    let fire_time = NaiveTime::from_hms_opt(rollup_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let candidate = now.date_naive().and_time(fire_time);

    let next = if candidate.and_utc() > now {
        candidate
    } else {
        candidate + TimeDelta::days(1)
    };

    (next.and_utc() - now)
        .to_std()
        .unwrap_or(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_run_is_later_today_when_hour_is_ahead() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 5, 0, 0).unwrap();
        assert_eq!(until_next_run(now, 6), Duration::from_secs(3600));
    }

    #[test]
    fn next_run_rolls_to_tomorrow_when_hour_has_passed() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 10, 30, 0).unwrap();
        assert_eq!(until_next_run(now, 0), Duration::from_secs(13 * 3600 + 1800));
    }

    #[test]
    fn firing_exactly_at_the_hour_waits_a_full_day() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 0, 0, 0).unwrap();
        assert_eq!(until_next_run(now, 0), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn out_of_range_hour_clamps_to_end_of_day() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap();
        assert_eq!(until_next_run(now, 99), Duration::from_secs(22 * 3600));
    }
}
