use std::any::Any;

use axum::{
    body::to_bytes,
    extract::Request,
    http::{header, HeaderValue, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ProblemDetails, PROBLEM_JSON};
use crate::middleware::context::correlation_id;

/// Upper bound when reading a framework error body to reuse as `detail`
const MAX_DETAIL_BYTES: usize = 4096;

/// Marks an error response whose own body must reach the client unchanged
#[derive(Debug, Clone, Copy)]
pub struct PassThrough;

/// Every 4xx/5xx leaves as `application/problem+json` with `instance`
/// and `correlationId` filled in.
pub async fn problem_details_middleware(request: Request, next: Next) -> Response {
    let instance = request.uri().path().to_string();
    let correlation = correlation_id(request.headers());

    let response = next.run(request).await;
    let status = response.status();
    if (!status.is_client_error() && !status.is_server_error()) || response.extensions().get::<PassThrough>().is_some() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let mut problem = match parts.extensions.remove::<ProblemDetails>() {
        Some(problem) => problem,
        None => {
            // Rejections and fallbacks from axum/tower carry plain-text bodies
            let bytes = to_bytes(body, MAX_DETAIL_BYTES).await.unwrap_or_default();
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            let detail = if text.is_empty() {
                status.canonical_reason().unwrap_or("Error").to_string()
            } else {
                text
            };
            let mut problem = ProblemDetails::from_status(status, detail);
            problem.status = status.as_u16();
            problem.title = status.canonical_reason().unwrap_or("Error").to_string();
            problem
        }
    };
    problem.instance = Some(instance);
    problem.correlation_id = correlation;

    let mut rebuilt = problem.into_response_with_status();
    let mut headers = parts.headers;
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
    *rebuilt.headers_mut() = headers;
    rebuilt
}

/// Response for `CatchPanicLayer`
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    ApiError::internal_server_error("An unexpected error occurred").into_response()
}

pub async fn fallback(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}
