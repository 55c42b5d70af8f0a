//! Error taxonomy for the `powerflow` backend service.
//!
//! Callers decide retry-vs-reject by matching the variant, never by
//! inspecting message text:
//! - [`Error::Validation`] – bad input, rejected before the data layer;
//!   the reason is safe to show to API clients.
//! - [`Error::Database`] / [`Error::Timeout`] – transient data-access
//!   failures; the pipeline marks the run failed and waits for the next
//!   scheduled firing.
//! - [`Error::Publish`] – reset-notification failure; logged and
//!   swallowed at the pipeline boundary, never fails a run.
//!
//! "Not found" is not an error kind: lookups return `Option`/empty
//! collections unless a caller's contract requires existence.

use std::time::Duration;

/// Result alias used throughout the core modules.
pub type Result<T> = std::result::Result<T, Error>;

// ---

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid request input; message is returned to the client.
    #[error("{0}")]
    Validation(String),

    /// Query or connection failure against PostgreSQL.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A pipeline stage exceeded its bounded timeout.
    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    /// MQTT reset publish failed.
    #[error("reset publish failed: {0}")]
    Publish(String),
}

impl Error {
    /// Construct a validation error from any displayable reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation(reason.into())
    }

    /// Whether a retry at the next scheduled firing could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Timeout(_) | Error::Publish(_))
    }
}
