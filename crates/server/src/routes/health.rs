//! Health checks.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Value, json};

use crate::db::Store;
use crate::services::PaymentBridge;
use crate::state::AppState;

pub fn router<S: Store, P: PaymentBridge>() -> Router<AppState<S, P>> {
    Router::new()
        .route("/health", get(readiness::<S, P>))
        .route("/health/live", get(liveness))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn liveness() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness<S: Store, P: PaymentBridge>(
    State(state): State<AppState<S, P>>,
) -> (StatusCode, Json<Value>) {
    match state.store().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy" })),
            )
        }
    }
}
