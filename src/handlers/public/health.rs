// handlers/public/health.rs - Liveness and readiness checks

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::database::DatabaseManager;
use crate::middleware::PassThrough;
use crate::state::AppState;

/// GET /health/live - The process is up; never touches the database
pub async fn health_live() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /health - Readiness, including a database ping
///
/// A failed ping answers 503 with the same body shape so load balancers
/// and dashboards can read it without problem-details handling.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let version = env!("CARGO_PKG_VERSION");

    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "version": version,
                "uptime_secs": uptime,
                "database": "ok",
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            let mut response = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "version": version,
                    "uptime_secs": uptime,
                    "database": "unavailable",
                })),
            )
                .into_response();
            response.extensions_mut().insert(PassThrough);
            response
        }
    }
}
