//! Configuration loader for the `powerflow` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of connections in the read-path pool.
    pub db_pool_max: u32,

    /// Maximum number of connections in the pipeline pool.
    pub db_pipeline_pool_max: u32,

    /// TCP port the HTTP server binds to.
    pub server_port: u16,

    /// MQTT broker the reset command is published to.
    pub mqtt_broker_url: String,

    /// Topic carrying the device-reset command.
    pub mqtt_reset_topic: String,

    /// UTC hour of day at which the daily rollup fires.
    pub rollup_hour_utc: u32,

    /// Bounded timeout for each pipeline stage, in seconds.
    pub stage_timeout_secs: u32,

    /// Maximum requests per client per rate-limit window.
    pub rate_limit_max: u32,

    /// Rate-limit window length, in seconds.
    pub rate_limit_window_secs: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max read-path connections (default: 5)
/// - `DB_PIPELINE_POOL_MAX` – max pipeline connections (default: 2)
/// - `SERVER_PORT` – HTTP port (default: 4444)
/// - `MQTT_BROKER_URL` – reset broker (default: mqtt://localhost:1883)
/// - `MQTT_RESET_TOPIC` – reset topic (default: pzem/energy/reset)
/// - `ROLLUP_HOUR_UTC` – daily rollup hour, 0-23 (default: 0)
/// - `PIPELINE_STAGE_TIMEOUT_SECS` – per-stage timeout (default: 300)
/// - `RATE_LIMIT_MAX` – requests per window (default: 1000)
/// - `RATE_LIMIT_WINDOW_SECS` – window length (default: 60)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let db_pipeline_pool_max = parse_env_u32!("DB_PIPELINE_POOL_MAX", 2);

    let server_port = u16::try_from(parse_env_u32!("SERVER_PORT", 4444))
        .map_err(|_| anyhow!("Invalid SERVER_PORT: must fit in a TCP port"))?;

    let mqtt_broker_url = env_or!("MQTT_BROKER_URL", "mqtt://localhost:1883");
    let mqtt_reset_topic = env_or!("MQTT_RESET_TOPIC", "pzem/energy/reset");

    let rollup_hour_utc = parse_env_u32!("ROLLUP_HOUR_UTC", 0);
    if rollup_hour_utc > 23 {
        return Err(anyhow!("Invalid ROLLUP_HOUR_UTC: must be 0-23"));
    }

    let stage_timeout_secs = parse_env_u32!("PIPELINE_STAGE_TIMEOUT_SECS", 300);
    let rate_limit_max = parse_env_u32!("RATE_LIMIT_MAX", 1000);
    let rate_limit_window_secs = parse_env_u32!("RATE_LIMIT_WINDOW_SECS", 60);

    Ok(Config {
        db_url,
        db_pool_max,
        db_pipeline_pool_max,
        server_port,
        mqtt_broker_url,
        mqtt_reset_topic,
        rollup_hour_utc,
        stage_timeout_secs,
        rate_limit_max,
        rate_limit_window_secs,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL                : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX                 : {}", self.db_pool_max);
        tracing::info!("  DB_PIPELINE_POOL_MAX        : {}", self.db_pipeline_pool_max);
        tracing::info!("  SERVER_PORT                 : {}", self.server_port);
        tracing::info!("  MQTT_BROKER_URL             : {}", self.mqtt_broker_url);
        tracing::info!("  MQTT_RESET_TOPIC            : {}", self.mqtt_reset_topic);
        tracing::info!("  ROLLUP_HOUR_UTC             : {}", self.rollup_hour_utc);
        tracing::info!("  PIPELINE_STAGE_TIMEOUT_SECS : {}", self.stage_timeout_secs);
        tracing::info!("  RATE_LIMIT_MAX              : {}", self.rate_limit_max);
        tracing::info!("  RATE_LIMIT_WINDOW_SECS      : {}", self.rate_limit_window_secs);
    }
}
