// handlers/protected/users.rs - Account administration (admin only)

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::database::models::user::{CreateUser, UpdateUser};
use crate::database::models::User;
use crate::error::ApiError;
use crate::handlers::table_request;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestContext};
use crate::state::AppState;
use crate::types::Role;
use crate::validation::ValidJson;

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    user.require(Role::Admin)?;
    let request = table_request(&state, &params)?;
    let page = state.users().list(&request).await?;
    Ok(Json(page).into_response())
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    body: Result<ValidJson<CreateUser>, ApiError>,
) -> ApiResult<User> {
    user.require(Role::Admin)?;
    let ValidJson(body) = body?;
    let created = state.users().create(body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/users/:id - Role, activation, display name and email
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<ValidJson<UpdateUser>, ApiError>,
) -> ApiResult<User> {
    user.require(Role::Admin)?;
    let ValidJson(body) = body?;
    let updated = state.users().update(id, body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(updated))
}
