//! Scheduled rollup of raw readings into per-interval aggregates.
//!
//! Reads every raw reading, groups by (truncated timestamp, device) in
//! [`summarize`], and writes the groups through the store's
//! transactional upsert. The write is keyed on the bucket/device pair,
//! so a rollup re-run after a crash updates rows in place instead of
//! duplicating them, and a failed write leaves no partial batch behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Interval, NewAggregate, Reading};
use crate::store::Store;

// ---

/// Computes and persists interval aggregates from raw readings.
pub struct Aggregator {
    store: Store,
}

impl Aggregator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Roll up all raw readings at the given interval.
    ///
    /// Returns the number of aggregate rows written. Safe to re-run:
    /// already-aggregated bucket/device pairs are updated, not
    /// duplicated.
    pub async fn rollup(&self, interval: Interval) -> Result<usize> {
        // ---
        let readings = self.store.fetch_readings().await?;
        let summaries = summarize(&readings, interval);

        if summaries.is_empty() {
            debug!("No raw readings to roll up");
            return Ok(0);
        }

        self.store.upsert_aggregates(&summaries).await?;
        info!(
            "Saved {} {} aggregates from {} raw readings",
            summaries.len(),
            interval.unit(),
            readings.len()
        );

        Ok(summaries.len())
    }
}

// ---

#[derive(Debug)]
struct GroupSums {
    // ---
    count: u32,
    voltage: f64,
    current: f64,
    active_power: f64,
    frequency: f64,
    power_factor: f64,
    max_energy: f64,
}

/// Group readings by (truncated timestamp, device) and compute one
/// summary per group: mean of the instantaneous fields, maximum of the
/// cumulative energy counter.
///
/// Output order is deterministic (bucket, then device), matching the
/// store's read order.
pub(crate) fn summarize(readings: &[Reading], interval: Interval) -> Vec<NewAggregate> {
    // ---
    let mut groups: BTreeMap<(DateTime<Utc>, String), GroupSums> = BTreeMap::new();

    for reading in readings {
        let bucket = interval.truncate(reading.timestamp);
        let sums = groups
            .entry((bucket, reading.device_name.clone()))
            .or_insert(GroupSums {
                count: 0,
                voltage: 0.0,
                current: 0.0,
                active_power: 0.0,
                frequency: 0.0,
                power_factor: 0.0,
                max_energy: f64::NEG_INFINITY,
            });

        sums.count += 1;
        sums.voltage += reading.voltage;
        sums.current += reading.current;
        sums.active_power += reading.active_power;
        sums.frequency += reading.frequency;
        sums.power_factor += reading.power_factor;
        sums.max_energy = sums.max_energy.max(reading.energy);
    }

    groups
        .into_iter()
        .map(|((hour_bucket, device_name), sums)| {
            let n = f64::from(sums.count);
            NewAggregate {
                hour_bucket,
                device_name,
                avg_voltage: sums.voltage / n,
                avg_current: sums.current / n,
                avg_active_power: sums.active_power / n,
                max_energy: sums.max_energy,
                avg_frequency: sums.frequency / n,
                avg_power_factor: sums.power_factor / n,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn reading(
        id: i32,
        device: &str,
        ts: DateTime<Utc>,
        voltage: f64,
        current: f64,
        energy: f64,
    ) -> Reading {
        // ---
        Reading {
            id,
            device_name: device.to_string(),
            timestamp: ts,
            voltage,
            current,
            active_power: voltage * current,
            energy,
            frequency: 60.0,
            power_factor: 0.95,
        }
    }

    #[test]
    fn readings_within_an_hour_collapse_to_one_row() {
        // ---
        let readings = vec![
            reading(1, "A", Utc.with_ymd_and_hms(2025, 3, 26, 1, 15, 0).unwrap(), 220.0, 2.0, 10.0),
            reading(2, "A", Utc.with_ymd_and_hms(2025, 3, 26, 1, 45, 0).unwrap(), 222.0, 3.0, 12.0),
        ];

        let summaries = summarize(&readings, Interval::Hour);
        assert_eq!(summaries.len(), 1);

        let row = &summaries[0];
        assert_eq!(row.hour_bucket, Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap());
        assert_eq!(row.device_name, "A");
        assert_eq!(row.avg_voltage, 221.0);
        assert_eq!(row.avg_current, 2.5);
        assert_eq!(row.max_energy, 12.0);
    }

    #[test]
    fn one_row_per_hour_device_pair() {
        // ---
        let readings = vec![
            reading(1, "A", Utc.with_ymd_and_hms(2025, 3, 26, 1, 5, 0).unwrap(), 220.0, 2.0, 10.0),
            reading(2, "B", Utc.with_ymd_and_hms(2025, 3, 26, 1, 10, 0).unwrap(), 230.0, 1.0, 4.0),
            reading(3, "A", Utc.with_ymd_and_hms(2025, 3, 26, 2, 0, 0).unwrap(), 221.0, 2.0, 11.0),
        ];

        let summaries = summarize(&readings, Interval::Hour);
        assert_eq!(summaries.len(), 3);

        let pairs: Vec<_> = summaries
            .iter()
            .map(|s| (s.hour_bucket, s.device_name.as_str()))
            .collect();
        let mut deduped = pairs.clone();
        deduped.dedup();
        assert_eq!(pairs, deduped);
    }

    #[test]
    fn summarize_is_deterministic_across_reruns() {
        // ---
        let readings = vec![
            reading(1, "B", Utc.with_ymd_and_hms(2025, 3, 26, 1, 5, 0).unwrap(), 230.0, 1.0, 4.0),
            reading(2, "A", Utc.with_ymd_and_hms(2025, 3, 26, 1, 15, 0).unwrap(), 220.0, 2.0, 10.0),
        ];

        let first = summarize(&readings, Interval::Hour);
        let second = summarize(&readings, Interval::Hour);
        assert_eq!(first, second);
        assert_eq!(first[0].device_name, "A");
    }

    #[test]
    fn no_readings_produce_no_summaries() {
        // ---
        assert!(summarize(&[], Interval::Hour).is_empty());
    }
}
