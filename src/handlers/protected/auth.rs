// handlers/protected/auth.rs - Session endpoints for the signed-in user

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestContext};
use crate::state::AppState;

/// GET /api/auth/me - The account behind the access token
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    let account = state.auth().me(user.user_id).await?;
    Ok(ApiResponse::success(account))
}

/// DELETE /api/auth/sessions - Sign out everywhere by revoking every refresh token
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
) -> ApiResult<Value> {
    let revoked = state.auth().logout_all(user.user_id, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(json!({ "revoked_sessions": revoked })))
}
