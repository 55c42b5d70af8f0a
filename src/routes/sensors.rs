//! Hourly sensor data endpoints.
//!
//! `GET /api/sensors` serves the rollup rows with optional device/date
//! filters and optional day/month re-bucketing through the on-demand
//! aggregator. `DELETE /api/sensors` removes named rollup rows.
//!
//! Validation failures (bad period, unparseable date, malformed delete
//! body) are answered with 400 and the specific reason before the store
//! is touched; store failures are answered with a generic 500 and the
//! cause is kept in the logs.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::aggregate::{apply_filters, bucket_rows, Filters, Period};
use crate::error::Error;
use crate::models::HourlyAggregate;
use crate::store::Store;

// ---

pub fn router() -> Router<Store> {
    // ---
    Router::new().route("/api/sensors", get(get_sensors).delete(delete_sensors))
}

// ---

/// Query parameters for `GET /api/sensors`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensorsQuery {
    // ---
    period: Option<String>,
    device_name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    single_date: Option<String>,
}

/// Hourly rollup row shaped for the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SensorPoint {
    // ---
    timestamp: String,
    id: i32,
    device_name: String,
    voltage: f64,
    current: f64,
    active_power: f64,
    energy: f64,
    frequency: f64,
    power_factor: f64,
}

impl From<&HourlyAggregate> for SensorPoint {
    fn from(row: &HourlyAggregate) -> Self {
        // ---
        Self {
            timestamp: row.hour_bucket.format("%m/%d/%Y, %I:%M:%S %p").to_string(),
            id: row.id,
            device_name: row.device_name.clone(),
            voltage: row.avg_voltage,
            current: row.avg_current,
            active_power: row.avg_active_power,
            energy: row.max_energy,
            frequency: row.avg_frequency,
            power_factor: row.avg_power_factor,
        }
    }
}

async fn get_sensors(
    Query(params): Query<SensorsQuery>,
    State(store): State<Store>,
) -> Response {
    // ---
    // Validate everything before touching the store (fail fast).
    let period = match params.period.as_deref().map(str::parse::<Period>).transpose() {
        Ok(period) => period,
        Err(e) => return validation_response(&e),
    };
    let filters = match parse_filters(&params) {
        Ok(filters) => filters,
        Err(e) => return validation_response(&e),
    };

    let rows = match store.fetch_hourly().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to fetch hourly aggregates: {}", e);
            return store_failure_response("Failed to retrieve sensor data.");
        }
    };

    let filtered = apply_filters(rows, &filters);
    info!("GET /api/sensors returning {} rows (period: {:?})", filtered.len(), period);

    match period {
        Some(period) => {
            let buckets = bucket_rows(&filtered, period);
            (StatusCode::OK, Json(serde_json::json!({ "data": buckets }))).into_response()
        }
        None => {
            let points: Vec<SensorPoint> = filtered.iter().map(SensorPoint::from).collect();
            (StatusCode::OK, Json(serde_json::json!({ "data": points }))).into_response()
        }
    }
}

/// Parse the optional date filters into calendar days.
fn parse_filters(params: &SensorsQuery) -> crate::error::Result<Filters> {
    // ---
    Ok(Filters {
        device_name: params.device_name.clone(),
        start_date: parse_date(params.start_date.as_deref(), "startDate")?,
        end_date: parse_date(params.end_date.as_deref(), "endDate")?,
        single_date: parse_date(params.single_date.as_deref(), "singleDate")?,
    })
}

fn parse_date(value: Option<&str>, name: &str) -> crate::error::Result<Option<NaiveDate>> {
    // ---
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| Error::validation(format!("{name} must be YYYY-MM-DD, got '{s}'")))
        })
        .transpose()
}

// ---

/// One delete target: a rollup row id (or several) plus its device.
#[derive(Debug, Deserialize)]
struct DeleteRow {
    // ---
    id: Option<IdSpec>,
    #[serde(rename = "deviceName", alias = "device_name")]
    device_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdSpec {
    One(i32),
    Many(Vec<i32>),
}

impl IdSpec {
    fn ids(&self) -> Vec<i32> {
        match self {
            IdSpec::One(id) => vec![*id],
            IdSpec::Many(ids) => ids.clone(),
        }
    }
}

async fn delete_sensors(
    State(store): State<Store>,
    Json(rows): Json<Vec<DeleteRow>>,
) -> Response {
    // ---
    if rows.is_empty() {
        return validation_response(&Error::validation("Invalid or empty delete request."));
    }

    // Reject the whole request before deleting anything if any entry is
    // incomplete.
    let mut targets: Vec<(Vec<i32>, String)> = Vec::with_capacity(rows.len());
    for row in &rows {
        match (&row.id, &row.device_name) {
            (Some(ids), Some(device)) => targets.push((ids.ids(), device.clone())),
            _ => {
                return validation_response(&Error::validation(
                    "Missing id or deviceName for deletion.",
                ));
            }
        }
    }

    let mut deleted = 0u64;
    for (ids, device_name) in targets {
        for id in ids {
            match store.delete_aggregate(id, &device_name).await {
                Ok(n) => deleted += n,
                Err(e) => {
                    error!("Failed to delete row {} for {}: {}", id, device_name, e);
                    return store_failure_response("Failed to delete sensor data.");
                }
            }
        }
    }

    info!("DELETE /api/sensors removed {} rows", deleted);
    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Selected data deleted successfully." })),
    )
        .into_response()
}

// ---

fn validation_response(err: &Error) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

fn store_failure_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn delete_body_accepts_single_and_multiple_ids() {
        // ---
        let body = r#"[{"id": 3, "deviceName": "aircon"}, {"id": [4, 5], "device_name": "fridge"}]"#;
        let rows: Vec<DeleteRow> = serde_json::from_str(body).unwrap();

        assert_eq!(rows[0].id.as_ref().unwrap().ids(), vec![3]);
        assert_eq!(rows[0].device_name.as_deref(), Some("aircon"));
        assert_eq!(rows[1].id.as_ref().unwrap().ids(), vec![4, 5]);
        assert_eq!(rows[1].device_name.as_deref(), Some("fridge"));
    }

    #[test]
    fn date_filter_parsing_validates_format() {
        // ---
        assert_eq!(
            parse_date(Some("2025-03-26"), "startDate").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 26)
        );
        assert!(parse_date(Some("03/26/2025"), "startDate").is_err());
        assert_eq!(parse_date(None, "startDate").unwrap(), None);
    }
}
