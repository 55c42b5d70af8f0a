//! Database schema management for `powerflow`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensor_readings` table written by the external ingestion
/// path, the `hourly_aggregates` rollup table, and the `pipeline_runs`
/// marker table. The unique constraint on (hour_bucket, device_name)
/// backs the aggregator's upsert, and the unique run_date backs the
/// daily idempotency guard. Safe to call on every startup; no-op if
/// objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Raw readings; rows are deleted only by the retention pruner once
    // their hour is committed into hourly_aggregates.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id            SERIAL PRIMARY KEY,
            device_name   TEXT             NOT NULL,
            timestamp     TIMESTAMPTZ      NOT NULL,
            voltage       DOUBLE PRECISION NOT NULL,
            current       DOUBLE PRECISION NOT NULL,
            active_power  DOUBLE PRECISION NOT NULL,
            energy        DOUBLE PRECISION NOT NULL,
            frequency     DOUBLE PRECISION NOT NULL,
            power_factor  DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Rollup table; at most one row per (hour_bucket, device_name).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hourly_aggregates (
            id               SERIAL PRIMARY KEY,
            hour_bucket      TIMESTAMPTZ      NOT NULL,
            device_name      TEXT             NOT NULL,
            avg_voltage      DOUBLE PRECISION NOT NULL,
            avg_current      DOUBLE PRECISION NOT NULL,
            avg_active_power DOUBLE PRECISION NOT NULL,
            max_energy       DOUBLE PRECISION NOT NULL,
            avg_frequency    DOUBLE PRECISION NOT NULL,
            avg_power_factor DOUBLE PRECISION NOT NULL,
            UNIQUE (hour_bucket, device_name)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Daily run markers for the idempotency guard.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id          SERIAL PRIMARY KEY,
            run_date    DATE        NOT NULL UNIQUE,
            recorded_at TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_timestamp
            ON sensor_readings (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_hourly_aggregates_device_name
            ON hourly_aggregates (device_name);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
