// handlers/protected/products.rs - Product inventory
//
// Reads need Viewer, writes Manager, deletes Admin.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::database::models::product::{CreateProduct, StockAdjustment, UpdateProduct};
use crate::database::models::Product;
use crate::error::ApiError;
use crate::filter::{equality_filters, FilterValueKind};
use crate::handlers::table_request;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestContext};
use crate::state::AppState;
use crate::types::Role;
use crate::validation::ValidJson;

const LIST_FILTERS: &[(&str, FilterValueKind)] = &[
    ("category", FilterValueKind::Text),
    ("is_active", FilterValueKind::Boolean),
];

/// GET /api/products - DataTables listing with `category` and `is_active` filters
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    user.require(Role::Viewer)?;
    let request = table_request(&state, &params)?;
    let filters = equality_filters(&params, LIST_FILTERS)?;
    let page = state.products().list(&request, filters).await?;
    Ok(Json(page).into_response())
}

/// GET /api/products/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Product> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.products().get(id).await?))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    body: Result<ValidJson<CreateProduct>, ApiError>,
) -> ApiResult<Product> {
    user.require(Role::Manager)?;
    let ValidJson(body) = body?;
    let product = state.products().create(body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::created(product))
}

/// PUT /api/products/:id - Partial update; omitted fields keep their value
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<ValidJson<UpdateProduct>, ApiError>,
) -> ApiResult<Product> {
    user.require(Role::Manager)?;
    let ValidJson(body) = body?;
    let product = state.products().update(id, body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(product))
}

/// DELETE /api/products/:id - Soft delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Role::Admin)?;
    state.products().delete(id, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/products/:id/stock - Signed stock adjustment
pub async fn adjust_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<ValidJson<StockAdjustment>, ApiError>,
) -> ApiResult<Product> {
    user.require(Role::Manager)?;
    let ValidJson(body) = body?;
    let product = state.products().adjust_stock(id, body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(product))
}

/// GET /api/products/low-stock
pub async fn low_stock(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Product>> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.products().low_stock().await?))
}

/// GET /api/products/categories
pub async fn categories(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<String>> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.products().categories().await?))
}
