// handlers/public/auth.rs - Token acquisition, rotation and revocation

use axum::extract::State;
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::TokenPair;
use crate::state::AppState;
use crate::validation::{Rules, ValidJson, Validate};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn rules(&self, rules: &mut Rules) {
        rules
            .required("username", &self.username)
            .max_length("username", Some(&self.username), 100)
            .required("password", &self.password)
            .max_length("password", Some(&self.password), 1024);
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn rules(&self, rules: &mut Rules) {
        rules.required("refresh_token", &self.refresh_token);
    }
}

/// POST /auth/login - Exchange credentials for an access/refresh token pair
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<TokenPair> {
    let actor = ctx.actor(None);
    let pair = state.auth().login(body.username.trim(), &body.password, &actor).await?;
    Ok(ApiResponse::success(pair))
}

/// POST /auth/refresh - Rotate a refresh token
pub async fn refresh(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidJson(body): ValidJson<RefreshRequest>,
) -> ApiResult<TokenPair> {
    let actor = ctx.actor(None);
    let pair = state.auth().refresh(body.refresh_token.trim(), &actor).await?;
    Ok(ApiResponse::success(pair))
}

/// POST /auth/logout - Revoke a refresh token (204 even if it was unknown)
pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidJson(body): ValidJson<RefreshRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    state.auth().logout(body.refresh_token.trim(), &ctx.actor(None)).await?;
    Ok(ApiResponse::no_content())
}
