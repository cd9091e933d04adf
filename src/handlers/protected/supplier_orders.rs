// handlers/protected/supplier_orders.rs - Purchase orders towards suppliers

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::database::models::supplier_order::{CreateSupplierOrder, UpdateSupplierOrderStatus};
use crate::database::models::SupplierOrderDetail;
use crate::error::ApiError;
use crate::filter::{equality_filters, FilterValueKind};
use crate::handlers::table_request;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestContext};
use crate::state::AppState;
use crate::types::Role;
use crate::validation::ValidJson;

/// GET /api/supplier-orders - DataTables listing with a `status` filter
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    user.require(Role::Viewer)?;
    let request = table_request(&state, &params)?;
    let filters = equality_filters(&params, &[("status", FilterValueKind::Text)])?;
    let page = state.supplier_orders().list(&request, filters).await?;
    Ok(Json(page).into_response())
}

/// GET /api/supplier-orders/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<SupplierOrderDetail> {
    user.require(Role::Viewer)?;
    Ok(ApiResponse::success(state.supplier_orders().get(id).await?))
}

/// POST /api/supplier-orders - Raise a purchase order
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    body: Result<ValidJson<CreateSupplierOrder>, ApiError>,
) -> ApiResult<SupplierOrderDetail> {
    user.require(Role::Manager)?;
    let ValidJson(body) = body?;
    let order = state.supplier_orders().create(body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::created(order))
}

/// PUT /api/supplier-orders/:id/status - `received` books the goods into stock
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<ValidJson<UpdateSupplierOrderStatus>, ApiError>,
) -> ApiResult<SupplierOrderDetail> {
    user.require(Role::Manager)?;
    let ValidJson(body) = body?;
    let order = state.supplier_orders().update_status(id, body, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::success(order))
}

/// DELETE /api/supplier-orders/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Role::Admin)?;
    state.supplier_orders().delete(id, &ctx.actor(Some(&user))).await?;
    Ok(ApiResponse::no_content())
}
