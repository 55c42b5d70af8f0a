//! Store access layer for `powerflow`.
//!
//! [`Store`] wraps one connection pool and owns every query the service
//! issues. Two instances are built at startup — one over the read pool
//! for API handlers, one over a separate pool for the rollup pipeline —
//! so a long aggregate/prune pass cannot starve concurrent reads.
//!
//! Lookups that can legitimately find nothing (`latest_hour_bucket`,
//! `latest_run_marker`) return `Option` rather than an error.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{HourlyAggregate, NewAggregate, Reading, RunMarker};

// ---

/// Max energy observed per device within one calendar day or month.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EnergyByPeriod {
    // ---
    pub device_name: String,
    pub period: DateTime<Utc>,
    pub highest_energy: f64,
}

/// Pooled store handle; cheap to clone, one per logical role.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // --- raw readings -------------------------------------------------

    /// All raw readings, oldest first.
    pub async fn fetch_readings(&self) -> Result<Vec<Reading>> {
        // ---
        let rows = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, device_name, timestamp, voltage, current, active_power,
                   energy, frequency, power_factor
            FROM sensor_readings
            ORDER BY timestamp, device_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Delete raw readings strictly older than `cutoff`.
    ///
    /// Returns the number of rows removed.
    pub async fn delete_readings_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        // ---
        let result = sqlx::query("DELETE FROM sensor_readings WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // --- hourly aggregates --------------------------------------------

    /// All rollup rows, ordered by bucket then device.
    pub async fn fetch_hourly(&self) -> Result<Vec<HourlyAggregate>> {
        // ---
        let rows = sqlx::query_as::<_, HourlyAggregate>(
            r#"
            SELECT id, hour_bucket, device_name, avg_voltage, avg_current,
                   avg_active_power, max_energy, avg_frequency, avg_power_factor
            FROM hourly_aggregates
            ORDER BY hour_bucket, device_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Latest bucket present across all rollup rows, if any.
    ///
    /// This is the pruner's cutoff: everything strictly older is safely
    /// summarized.
    pub async fn latest_hour_bucket(&self) -> Result<Option<DateTime<Utc>>> {
        // ---
        let max = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(hour_bucket) FROM hourly_aggregates",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(max)
    }

    /// Write a batch of rollup rows in one transaction.
    ///
    /// Keyed on (hour_bucket, device_name): re-running over already
    /// aggregated pairs updates in place instead of duplicating. Any
    /// failure rolls back the whole batch, so a retried run never sees a
    /// partial commit.
    pub async fn upsert_aggregates(&self, rows: &[NewAggregate]) -> Result<()> {
        // ---
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO hourly_aggregates (
                    hour_bucket, device_name, avg_voltage, avg_current,
                    avg_active_power, max_energy, avg_frequency, avg_power_factor
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (hour_bucket, device_name) DO UPDATE SET
                    avg_voltage      = EXCLUDED.avg_voltage,
                    avg_current      = EXCLUDED.avg_current,
                    avg_active_power = EXCLUDED.avg_active_power,
                    max_energy       = EXCLUDED.max_energy,
                    avg_frequency    = EXCLUDED.avg_frequency,
                    avg_power_factor = EXCLUDED.avg_power_factor
                "#,
            )
            .bind(row.hour_bucket)
            .bind(&row.device_name)
            .bind(row.avg_voltage)
            .bind(row.avg_current)
            .bind(row.avg_active_power)
            .bind(row.max_energy)
            .bind(row.avg_frequency)
            .bind(row.avg_power_factor)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete one rollup row addressed by id and device.
    pub async fn delete_aggregate(&self, id: i32, device_name: &str) -> Result<u64> {
        // ---
        let result = sqlx::query("DELETE FROM hourly_aggregates WHERE id = $1 AND device_name = $2")
            .bind(id)
            .bind(device_name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Distinct device names present in the rollup table.
    pub async fn device_names(&self) -> Result<Vec<String>> {
        // ---
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT device_name FROM hourly_aggregates ORDER BY device_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    /// Highest max_energy per device per calendar day, newest first.
    pub async fn daily_energy(&self) -> Result<Vec<EnergyByPeriod>> {
        // ---
        let rows = sqlx::query_as::<_, EnergyByPeriod>(
            r#"
            SELECT device_name,
                   DATE_TRUNC('day', hour_bucket) AS period,
                   MAX(max_energy) AS highest_energy
            FROM hourly_aggregates
            GROUP BY device_name, period
            ORDER BY period DESC, device_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Highest max_energy per device per calendar month, newest first.
    pub async fn monthly_energy(&self) -> Result<Vec<EnergyByPeriod>> {
        // ---
        let rows = sqlx::query_as::<_, EnergyByPeriod>(
            r#"
            SELECT device_name,
                   DATE_TRUNC('month', hour_bucket) AS period,
                   MAX(max_energy) AS highest_energy
            FROM hourly_aggregates
            GROUP BY device_name, period
            ORDER BY period DESC, device_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // --- pipeline run markers -----------------------------------------

    /// Most recent daily run marker, if the pipeline has ever run.
    pub async fn latest_run_marker(&self) -> Result<Option<RunMarker>> {
        // ---
        let marker = sqlx::query_as::<_, RunMarker>(
            r#"
            SELECT run_date, recorded_at
            FROM pipeline_runs
            ORDER BY run_date DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(marker)
    }

    /// Record a run marker for `date`.
    ///
    /// The unique run_date constraint makes a racing second insert a
    /// no-op rather than a duplicate.
    pub async fn record_run(&self, date: NaiveDate) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (run_date, recorded_at)
            VALUES ($1, $2)
            ON CONFLICT (run_date) DO NOTHING
            "#,
        )
        .bind(date)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
