//! Energy usage summary endpoint.
//!
//! Condenses the day/month max-energy groupings of the rollup table
//! into the dashboard's consumption card: today's, yesterday's and this
//! month's totals, the running device count, a 31-day usage vector, a
//! 12-slot monthly vector and a per-device daily breakdown. All
//! calendar arithmetic is UTC; the summary itself is assembled by a
//! pure function with the current date injected, so the shaping logic
//! is testable without a store.

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::{Datelike, Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::error;

use crate::store::{EnergyByPeriod, Store};

// ---

pub fn router() -> Router<Store> {
    // ---
    Router::new().route("/api/energy-usage-summary", get(handler))
}

/// Handle `GET /api/energy-usage-summary`.
async fn handler(State(store): State<Store>) -> impl IntoResponse {
    // ---
    let (daily, monthly) = match (store.daily_energy().await, store.monthly_energy().await) {
        (Ok(daily), Ok(monthly)) => (daily, monthly),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to fetch energy groupings: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to retrieve energy usage summary."
                })),
            )
                .into_response();
        }
    };

    let summary = build_summary(&daily, &monthly, Utc::now().date_naive());
    (StatusCode::OK, Json(summary)).into_response()
}

// ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionSummary {
    // ---
    pub todays_consumption: String,
    pub yesterdays_consumption: String,
    pub this_months_consumption: String,
    pub running_devices_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergySummary {
    // ---
    pub consumption_summary: ConsumptionSummary,
    /// Usage per day over the trailing 31-day window, oldest first.
    pub daily_energy_usage: Vec<f64>,
    /// Usage per calendar month, January at index 0.
    pub monthly_energy_usage: Vec<f64>,
    pub daily_energy_usage_per_room: BTreeMap<String, Vec<f64>>,
}

/// Assemble the summary from the store's period groupings.
///
/// Rows landing exactly on a period start count toward that period
/// (inclusive calendar equality, not strict ordering).
pub fn build_summary(
    daily: &[EnergyByPeriod],
    monthly: &[EnergyByPeriod],
    today: NaiveDate,
) -> EnergySummary {
    // ---
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let window_start = today.checked_sub_days(Days::new(30)).unwrap_or(today);
    let current_month = today.with_day(1);

    let mut todays = 0.0;
    let mut yesterdays = 0.0;
    let mut this_months = 0.0;
    let mut running_devices: BTreeSet<&str> = BTreeSet::new();
    let mut daily_usage = vec![0.0; 31];
    let mut monthly_usage = vec![0.0; 12];
    let mut per_room: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for item in monthly {
        let month = item.period.date_naive();
        if Some(month) == current_month {
            this_months += item.highest_energy;
        }
        running_devices.insert(item.device_name.as_str());
        monthly_usage[month.month0() as usize] += item.highest_energy;
    }

    for item in daily {
        let day = item.period.date_naive();
        if day == today {
            todays += item.highest_energy;
        }
        if day == yesterday {
            yesterdays += item.highest_energy;
        }
        running_devices.insert(item.device_name.as_str());

        if day >= window_start && day <= today {
            let index = (day - window_start).num_days() as usize;
            daily_usage[index] += item.highest_energy;
            per_room
                .entry(item.device_name.clone())
                .or_insert_with(|| vec![0.0; 31])[index] += item.highest_energy;
        }
    }

    EnergySummary {
        consumption_summary: ConsumptionSummary {
            todays_consumption: format_energy(todays),
            yesterdays_consumption: format_energy(yesterdays),
            this_months_consumption: format_energy(this_months),
            running_devices_count: running_devices.len(),
        },
        daily_energy_usage: daily_usage,
        monthly_energy_usage: monthly_usage,
        daily_energy_usage_per_room: per_room,
    }
}

/// Human-readable energy total: watt-hours below 1000, kilowatt-hours
/// at or above, both to two decimals.
pub fn format_energy(value: f64) -> String {
    // ---
    if value >= 1000.0 {
        format!("{:.2} kWh", value / 1000.0)
    } else {
        format!("{value:.2} Wh")
    }
}
