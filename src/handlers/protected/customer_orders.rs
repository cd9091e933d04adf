// handlers/protected/customer_orders.rs - Customer orders and their status machine

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::database::models::customer_order::{CreateCustomerOrder, UpdateOrderStatus};
use crate::database::models::CustomerOrderDetail;
use crate::error::ApiError;
use crate::filter::{equality_filters, FilterValueKind};
use crate::handlers::table_request;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestContext};
use crate::state::AppState;
use crate::types::Role;
use crate::validation::ValidJson;

/// GET /api/customer-orders - DataTables listing with a `status` filter
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    user.require(Role::Viewer)?;
    let request = table_request(&state, &params)?;
    let filters = equality_filters(&params, &[("status", FilterValueKind::Text)])?;
    let page = state.customer_orders().list(&request, filters).await?;
    Ok(Json(page).into_response())
}

/// GET /api/customer-orders/:id - Order with its line items
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<CustomerOrderDetail> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.customer_orders().get(id).await?))
}

/// POST /api/customer-orders - Place an order, reserving stock
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    body: Result<ValidJson<CreateCustomerOrder>, ApiError>,
) -> ApiResult<CustomerOrderDetail> {
    user.require(Role::Manager)?;
    let ValidJson(body) = body?;
    let order = state.customer_orders().create(body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::created(order))
}

/// PUT /api/customer-orders/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<ValidJson<UpdateOrderStatus>, ApiError>,
) -> ApiResult<CustomerOrderDetail> {
    user.require(Role::Manager)?;
    let ValidJson(body) = body?;
    let order = state.customer_orders().update_status(id, body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(order))
}

/// DELETE /api/customer-orders/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Role::Admin)?;
    state.customer_orders().delete(id, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::no_content())
}
