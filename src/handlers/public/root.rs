// handlers/public/root.rs - GET / service discovery

use axum::response::IntoResponse;
use serde_json::json;

use crate::middleware::ApiResponse;

/// GET / - Name, version and a map of the API surface
pub async fn root() -> impl IntoResponse {
    ApiResponse::success(json!({
        "name": "BizAdmin API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Inventory, orders, audit and insights for small business administration",
        "endpoints": {
            "health": "/health, /health/live (public)",
            "auth": "/auth/login, /auth/refresh, /auth/logout (public - token acquisition)",
            "session": "/api/auth/me, /api/auth/sessions (protected)",
            "products": "/api/products[/:id][/stock] (protected)",
            "customer_orders": "/api/customer-orders[/:id][/status] (protected)",
            "supplier_orders": "/api/supplier-orders[/:id][/status] (protected)",
            "insights": "/api/insights/* (protected)",
            "alerts": "/api/alerts (protected)",
            "profile": "/api/profile[/password] (protected)",
            "users": "/api/users[/:id] (admin)",
            "audit": "/api/audit[/:id] (admin)",
            "settings": "/api/settings[/:key] (admin writes)",
        }
    }))
}
