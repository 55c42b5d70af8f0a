//! Device listing endpoint: the distinct device names that have rollup
//! rows, used by dashboards to populate their filter dropdowns.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use tracing::error;

use crate::store::Store;

// ---

pub fn router() -> Router<Store> {
    // ---
    Router::new().route("/api/devices", get(handler))
}

/// Handle `GET /api/devices`.
async fn handler(State(store): State<Store>) -> impl IntoResponse {
    // ---
    match store.device_names().await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(e) => {
            error!("Failed to fetch device names: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to fetch device names" })),
            )
                .into_response()
        }
    }
}
