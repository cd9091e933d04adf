// handlers/protected/settings.rs - System settings
//
// Any signed-in user may read; only admins change or reset.

use axum::{
    extract::{Path, State},
    Extension,
};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestContext};
use crate::services::{SettingValue, UpdateSetting};
use crate::state::AppState;
use crate::types::Role;
use crate::validation::ValidJson;

/// GET /api/settings - Every known key with its effective value
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<SettingValue>> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.settings().list().await?))
}

/// GET /api/settings/:key
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(key): Path<String>,
) -> ApiResult<SettingValue> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.settings().get(&key).await?))
}

/// PUT /api/settings/:key - `{ "value": ... }`, type-checked per key
pub async fn put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(key): Path<String>,
    body: Result<ValidJson<UpdateSetting>, ApiError>,
) -> ApiResult<SettingValue> {
    user.require(Role::Admin)?;
    let ValidJson(body) = body?;
    let setting = state.settings().put(&key, body.value, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(setting))
}

/// DELETE /api/settings/:key - Reset to the built-in default
pub async fn reset(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(key): Path<String>,
) -> ApiResult<SettingValue> {
    user.require(Role::Admin)?;
    let setting = state.settings().reset(&key, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(setting))
}
