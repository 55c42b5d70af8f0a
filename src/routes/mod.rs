use std::sync::Arc;

use axum::{middleware, Router};

use crate::rate_limit::{self, RateLimiter};
use crate::store::Store;

mod devices;
mod health;
mod sensors;
mod summary;

// ---

/// Build the API router over the read-path store handle.
///
/// The data routes sit behind the fixed-window rate limiter; the health
/// probe stays outside it so orchestrators are never throttled.
pub fn router(store: Store, limiter: Arc<RateLimiter>) -> Router {
    // ---
    let data_routes = Router::new()
        .merge(sensors::router())
        .merge(devices::router())
        .merge(summary::router())
        .layer(middleware::from_fn_with_state(limiter, rate_limit::limit));

    Router::new()
        .merge(data_routes)
        .merge(health::router())
        .with_state(store)
}
