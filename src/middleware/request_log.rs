use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Request/response and performance logging. Requests slower than
/// `api.slow_request_threshold_ms` are logged at WARN.
pub async fn request_logging_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.api.enable_request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    if elapsed_ms >= state.config.api.slow_request_threshold_ms {
        tracing::warn!(%method, %path, status, elapsed_ms, "Slow request");
    } else if response.status().is_server_error() {
        tracing::error!(%method, %path, status, elapsed_ms, "Request failed");
    } else {
        tracing::info!(%method, %path, status, elapsed_ms, "Request completed");
    }

    response
}
