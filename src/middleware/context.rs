use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap, HeaderName},
};

use crate::middleware::auth::AuthUser;
use crate::services::Actor;

pub const CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Per-request facts that end up in audit entries
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub correlation_id: Option<String>,
    pub ip: Option<String>,
}

impl RequestContext {
    pub fn from_parts(headers: &HeaderMap, extensions: &Extensions) -> Self {
        Self {
            correlation_id: correlation_id(headers),
            ip: Some(client_ip(headers, extensions)),
        }
    }

    pub fn actor(&self, user: Option<&AuthUser>) -> Actor {
        Actor {
            user_id: user.map(|u| u.user_id),
            username: user.map(|u| u.username.clone()),
            correlation_id: self.correlation_id.clone(),
            ip: self.ip.clone(),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(&parts.headers, &parts.extensions))
    }
}

pub fn correlation_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Socket address first, then the first `X-Forwarded-For` hop, else "unknown"
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_socket_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let mut extensions = Extensions::new();
        assert_eq!(client_ip(&headers, &extensions), "203.0.113.9");

        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_ip(&headers, &extensions), "192.0.2.1");

        assert_eq!(client_ip(&HeaderMap::new(), &Extensions::new()), "unknown");
    }

    #[test]
    fn actor_carries_request_facts() {
        let mut headers = HeaderMap::new();
        headers.insert(&CORRELATION_ID_HEADER, HeaderValue::from_static("req-1"));
        let ctx = RequestContext::from_parts(&headers, &Extensions::new());
        let actor = ctx.actor(None);
        assert_eq!(actor.correlation_id.as_deref(), Some("req-1"));
        assert_eq!(actor.ip.as_deref(), Some("unknown"));
        assert!(actor.user_id.is_none());
    }
}
