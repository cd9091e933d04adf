// app.rs - Router assembly
//
// Route groups are merged into one router; global layers are listed
// innermost first, so the request id is set before anything else runs.

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::{
    api_rate_limit_middleware, fallback, handle_panic, jwt_auth_middleware, login_rate_limit_middleware,
    problem_details_middleware, request_logging_middleware, security_headers_middleware, CORRELATION_ID_HEADER,
};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let api = &state.config.api;

    let mut router = Router::new()
        .merge(public_routes(&state))
        .merge(api_routes(&state))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(api.max_request_size_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(problem_details_middleware))
        .layer(from_fn_with_state(state.clone(), security_headers_middleware))
        .layer(from_fn_with_state(state.clone(), request_logging_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let correlation_id = request
                .headers()
                .get(&CORRELATION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http",
                method = %request.method(),
                path = %request.uri().path(),
                correlation_id = %correlation_id,
            )
        }))
        .layer(PropagateRequestIdLayer::new(CORRELATION_ID_HEADER))
        .layer(SetRequestIdLayer::new(CORRELATION_ID_HEADER, MakeRequestUuid));

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security));
    }

    router.with_state(state)
}

fn public_routes(state: &AppState) -> Router<AppState> {
    use public::auth;

    let login = Router::new()
        .route("/auth/login", post(auth::login))
        .route_layer(from_fn_with_state(state.clone(), login_rate_limit_middleware));

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/health/live", get(public::health_live))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .merge(login)
}

fn api_routes(state: &AppState) -> Router<AppState> {
    use protected::{alerts, audit, auth, customer_orders, insights, products, profile, settings, supplier_orders, users};

    Router::new()
        // Session
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/sessions", axum::routing::delete(auth::logout_all))
        // Inventory
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/low-stock", get(products::low_stock))
        .route("/api/products/categories", get(products::categories))
        .route(
            "/api/products/:id",
            get(products::get).put(products::update).delete(products::delete),
        )
        .route("/api/products/:id/stock", post(products::adjust_stock))
        // Orders
        .route("/api/customer-orders", get(customer_orders::list).post(customer_orders::create))
        .route("/api/customer-orders/:id", get(customer_orders::get).delete(customer_orders::delete))
        .route("/api/customer-orders/:id/status", put(customer_orders::update_status))
        .route("/api/supplier-orders", get(supplier_orders::list).post(supplier_orders::create))
        .route("/api/supplier-orders/:id", get(supplier_orders::get).delete(supplier_orders::delete))
        .route("/api/supplier-orders/:id/status", put(supplier_orders::update_status))
        // Audit
        .route("/api/audit", get(audit::list))
        .route("/api/audit/:id", get(audit::get))
        // Insights
        .route("/api/insights/summary", get(insights::summary))
        .route("/api/insights/sales", get(insights::sales))
        .route("/api/insights/top-products", get(insights::top_products))
        .route("/api/insights/order-status", get(insights::order_status))
        .route("/api/insights/inventory-by-category", get(insights::inventory_by_category))
        // Accounts
        .route("/api/profile", get(profile::get).put(profile::update))
        .route("/api/profile/password", put(profile::change_password))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", put(users::update))
        // Configuration
        .route("/api/settings", get(settings::list))
        .route(
            "/api/settings/:key",
            get(settings::get).put(settings::put).delete(settings::reset),
        )
        .route("/api/alerts", get(alerts::list))
        // Outermost route layer runs first: rate limit, then authentication
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
        .route_layer(from_fn_with_state(state.clone(), api_rate_limit_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([CORRELATION_ID_HEADER]);

    if security.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
