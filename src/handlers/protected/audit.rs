// handlers/protected/audit.rs - Audit trail (admin only)

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};

use crate::database::models::AuditLog;
use crate::error::ApiError;
use crate::handlers::table_request;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::AuditFilter;
use crate::state::AppState;
use crate::types::Role;

/// GET /api/audit - DataTables listing; filters `entity_type`, `action`, `username`, `from`, `to`
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    user.require(Role::Admin)?;
    let request = table_request(&state, &params)?;
    let filter = AuditFilter::from_params(&params)?;
    let page = state.audit().list(&request, &filter).await?;
    Ok(Json(page).into_response())
}

/// GET /api/audit/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<AuditLog> {
    user.require(Role::Admin)?;
    Ok(ApiResponse::success(state.audit().get(id).await?))
}
