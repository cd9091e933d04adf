pub mod auth;
pub mod context;
pub mod problem;
pub mod rate_limit;
pub mod request_log;
pub mod response;
pub mod security_headers;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use context::{RequestContext, CORRELATION_ID_HEADER};
pub use problem::{fallback, handle_panic, problem_details_middleware, PassThrough};
pub use rate_limit::{api_rate_limit_middleware, login_rate_limit_middleware, RateLimits};
pub use request_log::request_logging_middleware;
pub use response::{ApiResponse, ApiResult};
pub use security_headers::security_headers_middleware;
