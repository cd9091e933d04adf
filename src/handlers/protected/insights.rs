// handlers/protected/insights.rs - Dashboard aggregates
//
// `days` (default 30, clamped to 1..=365) selects the trailing window.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension,
};

use crate::error::ApiError;
use crate::handlers::query_param;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::insights_service::{
    clamp_days, clamp_limit, CategoryChart, DonutChart, InventoryByCategory, Summary, TopProducts,
};
use crate::state::AppState;
use crate::types::Role;

fn window(user: &AuthUser, params: &HashMap<String, String>) -> Result<i64, ApiError> {
    user.require(Role::Viewer)?;
    Ok(clamp_days(query_param(params, "days")?))
}

/// GET /api/insights/summary - KPI cards
pub async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Summary> {
    let days = window(&user, &params)?;
    Ok(ApiResponse::success(state.insights().summary(days).await?))
}

/// GET /api/insights/sales - Daily revenue and order counts
pub async fn sales(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<CategoryChart> {
    let days = window(&user, &params)?;
    Ok(ApiResponse::success(state.insights().sales_over_time(days).await?))
}

/// GET /api/insights/top-products - Best sellers; `limit` defaults to 5
pub async fn top_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<TopProducts> {
    let days = window(&user, &params)?;
    let limit = clamp_limit(query_param(&params, "limit")?);
    Ok(ApiResponse::success(state.insights().top_products(days, limit).await?))
}

/// GET /api/insights/order-status
pub async fn order_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<DonutChart> {
    let days = window(&user, &params)?;
    Ok(ApiResponse::success(state.insights().order_status_breakdown(days).await?))
}

/// GET /api/insights/inventory-by-category
pub async fn inventory_by_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<InventoryByCategory> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.insights().inventory_by_category().await?))
}
