//! Data models for the power telemetry rollup pipeline.

use chrono::{DateTime, DurationRound, NaiveDate, TimeDelta, Utc};

// ---

/// Raw telemetry reading as written by the ingestion path.
///
/// Immutable once stored; only the retention pruner ever deletes rows.
/// `energy` is a cumulative per-device counter, so the end-of-period
/// value is the maximum within the period, not a sum.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: i32,
    pub device_name: String,
    pub timestamp: DateTime<Utc>,
    pub voltage: f64,
    pub current: f64,
    pub active_power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
}

/// One stored rollup row per (hour_bucket, device_name).
///
/// Created by the pipeline aggregator, never mutated afterwards; read by
/// the on-demand aggregator and by the pruner's cutoff computation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HourlyAggregate {
    // ---
    pub id: i32,
    pub hour_bucket: DateTime<Utc>,
    pub device_name: String,
    pub avg_voltage: f64,
    pub avg_current: f64,
    pub avg_active_power: f64,
    pub max_energy: f64,
    pub avg_frequency: f64,
    pub avg_power_factor: f64,
}

/// A computed rollup row that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAggregate {
    // ---
    pub hour_bucket: DateTime<Utc>,
    pub device_name: String,
    pub avg_voltage: f64,
    pub avg_current: f64,
    pub avg_active_power: f64,
    pub max_energy: f64,
    pub avg_frequency: f64,
    pub avg_power_factor: f64,
}

/// Record of a claimed daily pipeline run.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunMarker {
    // ---
    pub run_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

// ---

/// Rollup granularity.
///
/// The scheduled pipeline only runs hourly rollups today; coarser
/// intervals are added as new variants, not new call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Hour,
}

impl Interval {
    /// Truncate a timestamp down to the start of its bucket.
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        // ---
        let step = match self {
            Interval::Hour => TimeDelta::hours(1),
        };
        // Truncation of an in-range timestamp cannot fail; fall back to
        // the original value rather than panic.
        ts.duration_trunc(step).unwrap_or(ts)
    }

    /// Unit name as used in log lines.
    pub fn unit(&self) -> &'static str {
        match self {
            Interval::Hour => "hour",
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hour_truncation_drops_minutes_and_seconds() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 12).unwrap();
        let truncated = Interval::Hour.truncate(ts);
        assert_eq!(truncated, Utc.with_ymd_and_hms(2025, 3, 26, 18, 0, 0).unwrap());
    }

    #[test]
    fn hour_truncation_is_idempotent() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap();
        assert_eq!(Interval::Hour.truncate(ts), ts);
    }

    #[test]
    fn interval_unit_names() {
        // ---
        assert_eq!(Interval::Hour.unit(), "hour");
    }
}
