// handlers/protected/profile.rs - Self-service account endpoints

use axum::{extract::State, Extension};

use crate::database::models::user::{ChangePassword, UpdateProfile};
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestContext};
use crate::state::AppState;
use crate::validation::ValidJson;

/// GET /api/profile
pub async fn get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users().get(user.user_id).await?))
}

/// PUT /api/profile - Display name and email
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    ValidJson(body): ValidJson<UpdateProfile>,
) -> ApiResult<User> {
    let account = state
        .users()
        .update_profile(user.user_id, body, &ctx.actor(Some(&user)))
        .await?;
    Ok(ApiResponse::success(account))
}

/// PUT /api/profile/password - Also signs the user out of every session
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    ValidJson(body): ValidJson<ChangePassword>,
) -> Result<ApiResponse<()>, ApiError> {
    state
        .users()
        .change_password(user.user_id, body, &ctx.actor(Some(&user)))
        .await?;
    tracing::info!(user = %user.username, "Password changed");
    Ok(ApiResponse::no_content())
}
