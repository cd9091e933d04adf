// handlers/protected/alerts.rs - GET /api/alerts

use axum::{extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::Alert;
use crate::state::AppState;
use crate::types::Role;

/// GET /api/alerts - Stock, stale order and overdue delivery alerts, most severe first
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Alert>> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.alerts().list().await?))
}
