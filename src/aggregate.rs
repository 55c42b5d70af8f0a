//! On-demand bucketing of hourly rollup rows for the read API.
//!
//! Independent of the scheduled pipeline: handlers fetch hourly rows,
//! apply the request filters exactly once here, then regroup into
//! calendar-day or calendar-month buckets. Averaged fields are the mean
//! of the constituent hourly averages (all source hours carry equal
//! weight); energy is the group maximum since the underlying counter is
//! cumulative. Everything in this module is pure over its input.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::HourlyAggregate;

// ---

/// Requested bucketing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Month,
}

impl FromStr for Period {
    type Err = Error;

    /// Rejected before any grouping is attempted; anything other than
    /// `day` or `month` never reaches the aggregation.
    fn from_str(s: &str) -> Result<Self> {
        // ---
        match s {
            "day" => Ok(Period::Day),
            "month" => Ok(Period::Month),
            other => Err(Error::validation(format!(
                "Invalid period '{other}'. Use 'day' or 'month'."
            ))),
        }
    }
}

impl Period {
    /// Anchor date for a bucket: the day itself, or the first of the month.
    fn anchor(&self, date: NaiveDate) -> NaiveDate {
        // ---
        match self {
            Period::Day => date,
            Period::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Wire label for a bucket key.
    fn label(&self, anchor: NaiveDate) -> String {
        match self {
            Period::Day => anchor.format("%m/%d/%Y").to_string(),
            Period::Month => anchor.format("%m/%Y").to_string(),
        }
    }
}

// ---

/// Optional read-path filters, applied once before grouping.
#[derive(Debug, Default, Clone)]
pub struct Filters {
    // ---
    /// Exact device match.
    pub device_name: Option<String>,
    /// Rows strictly after this calendar day.
    pub start_date: Option<NaiveDate>,
    /// Rows strictly before this calendar day.
    pub end_date: Option<NaiveDate>,
    /// Rows on exactly this calendar day.
    pub single_date: Option<NaiveDate>,
}

/// Apply request filters to hourly rows.
pub fn apply_filters(rows: Vec<HourlyAggregate>, filters: &Filters) -> Vec<HourlyAggregate> {
    // ---
    rows.into_iter()
        .filter(|r| {
            filters
                .device_name
                .as_ref()
                .map_or(true, |name| &r.device_name == name)
        })
        .filter(|r| {
            let day = r.hour_bucket.date_naive();
            filters.start_date.map_or(true, |start| day > start)
                && filters.end_date.map_or(true, |end| day < end)
                && filters.single_date.map_or(true, |single| day == single)
        })
        .collect()
}

// ---

/// A derived day/month bucket; never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    // ---
    pub timestamp: String,
    /// Ids of the member hourly rows.
    pub id: Vec<i32>,
    pub device_name: String,
    pub voltage: f64,
    pub current: f64,
    pub active_power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
}

#[derive(Debug)]
struct Accumulator {
    // ---
    ids: Vec<i32>,
    voltage: f64,
    current: f64,
    active_power: f64,
    frequency: f64,
    power_factor: f64,
    max_energy: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            voltage: 0.0,
            current: 0.0,
            active_power: 0.0,
            frequency: 0.0,
            power_factor: 0.0,
            max_energy: f64::NEG_INFINITY,
        }
    }
}

/// Group hourly rows into buckets for the requested period.
///
/// The grouping key is (period anchor, device), so a bucket can never
/// mix rows from different devices. Empty input yields empty output.
pub fn bucket_rows(rows: &[HourlyAggregate], period: Period) -> Vec<Bucket> {
    // ---
    let mut groups: BTreeMap<(NaiveDate, String), Accumulator> = BTreeMap::new();

    for row in rows {
        let anchor = period.anchor(row.hour_bucket.date_naive());
        let acc = groups
            .entry((anchor, row.device_name.clone()))
            .or_default();

        acc.voltage += row.avg_voltage;
        acc.current += row.avg_current;
        acc.active_power += row.avg_active_power;
        acc.frequency += row.avg_frequency;
        acc.power_factor += row.avg_power_factor;
        acc.max_energy = acc.max_energy.max(row.max_energy);
        acc.ids.push(row.id);
    }

    groups
        .into_iter()
        .map(|((anchor, device_name), acc)| {
            let n = acc.ids.len() as f64;
            Bucket {
                timestamp: period.label(anchor),
                id: acc.ids,
                device_name,
                voltage: round2(acc.voltage / n),
                current: round2(acc.current / n),
                active_power: round2(acc.active_power / n),
                energy: acc.max_energy,
                frequency: round2(acc.frequency / n),
                power_factor: round2(acc.power_factor / n),
            }
        })
        .collect()
}

/// Round to two decimal places for the wire format.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn hourly(
        id: i32,
        device: &str,
        bucket: DateTime<Utc>,
        avg_voltage: f64,
        max_energy: f64,
    ) -> HourlyAggregate {
        // ---
        HourlyAggregate {
            id,
            hour_bucket: bucket,
            device_name: device.to_string(),
            avg_voltage,
            avg_current: 2.0,
            avg_active_power: 440.0,
            max_energy,
            avg_frequency: 60.0,
            avg_power_factor: 0.95,
        }
    }

    #[test]
    fn period_parsing_accepts_day_and_month_only() {
        // ---
        assert_eq!("day".parse::<Period>().unwrap(), Period::Day);
        assert_eq!("month".parse::<Period>().unwrap(), Period::Month);

        let err = "week".parse::<Period>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn day_bucket_averages_hourly_rows_and_keeps_max_energy() {
        // ---
        let rows = vec![
            hourly(1, "aircon", Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap(), 220.0, 10.0),
            hourly(2, "aircon", Utc.with_ymd_and_hms(2025, 3, 26, 2, 0, 0).unwrap(), 224.0, 12.0),
        ];

        let buckets = bucket_rows(&rows, Period::Day);
        assert_eq!(buckets.len(), 1);

        let bucket = &buckets[0];
        assert_eq!(bucket.timestamp, "03/26/2025");
        assert_eq!(bucket.device_name, "aircon");
        assert_eq!(bucket.voltage, 222.0);
        assert_eq!(bucket.energy, 12.0);
        assert_eq!(bucket.id, vec![1, 2]);
    }

    #[test]
    fn month_buckets_group_across_days() {
        // ---
        let rows = vec![
            hourly(1, "fridge", Utc.with_ymd_and_hms(2025, 3, 1, 5, 0, 0).unwrap(), 220.0, 5.0),
            hourly(2, "fridge", Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap(), 222.0, 9.0),
            hourly(3, "fridge", Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap(), 230.0, 3.0),
        ];

        let buckets = bucket_rows(&rows, Period::Month);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].timestamp, "03/2025");
        assert_eq!(buckets[0].voltage, 221.0);
        assert_eq!(buckets[0].energy, 9.0);
        assert_eq!(buckets[1].timestamp, "04/2025");
    }

    #[test]
    fn devices_never_share_a_bucket() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap();
        let rows = vec![
            hourly(1, "aircon", ts, 220.0, 10.0),
            hourly(2, "fridge", ts, 230.0, 4.0),
        ];

        let buckets = bucket_rows(&rows, Period::Day);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].device_name, "aircon");
        assert_eq!(buckets[1].device_name, "fridge");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        // ---
        assert!(bucket_rows(&[], Period::Day).is_empty());
    }

    #[test]
    fn device_filter_is_exact_match() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap();
        let rows = vec![
            hourly(1, "aircon", ts, 220.0, 10.0),
            hourly(2, "fridge", ts, 230.0, 4.0),
        ];

        let filters = Filters {
            device_name: Some("fridge".to_string()),
            ..Filters::default()
        };
        let filtered = apply_filters(rows, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].device_name, "fridge");
    }

    #[test]
    fn date_range_bounds_are_exclusive_at_day_granularity() {
        // ---
        let rows = vec![
            hourly(1, "aircon", Utc.with_ymd_and_hms(2025, 3, 25, 23, 0, 0).unwrap(), 220.0, 1.0),
            hourly(2, "aircon", Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap(), 220.0, 2.0),
            hourly(3, "aircon", Utc.with_ymd_and_hms(2025, 3, 27, 1, 0, 0).unwrap(), 220.0, 3.0),
        ];

        let filters = Filters {
            start_date: NaiveDate::from_ymd_opt(2025, 3, 25),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 27),
            ..Filters::default()
        };
        let filtered = apply_filters(rows, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 2);
    }

    #[test]
    fn single_date_filter_matches_one_day() {
        // ---
        let rows = vec![
            hourly(1, "aircon", Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap(), 220.0, 1.0),
            hourly(2, "aircon", Utc.with_ymd_and_hms(2025, 3, 27, 1, 0, 0).unwrap(), 220.0, 2.0),
        ];

        let filters = Filters {
            single_date: NaiveDate::from_ymd_opt(2025, 3, 27),
            ..Filters::default()
        };
        let filtered = apply_filters(rows, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 2);
    }

    #[test]
    fn wire_values_round_to_two_decimals() {
        // ---
        let rows = vec![
            hourly(1, "aircon", Utc.with_ymd_and_hms(2025, 3, 26, 1, 0, 0).unwrap(), 220.111, 1.0),
            hourly(2, "aircon", Utc.with_ymd_and_hms(2025, 3, 26, 2, 0, 0).unwrap(), 220.222, 1.0),
        ];

        let buckets = bucket_rows(&rows, Period::Day);
        assert_eq!(buckets[0].voltage, 220.17);
    }
}
