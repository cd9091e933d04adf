//! HTTP client for the BizAdmin API.
//!
//! Holds the access/refresh token pair from `login`. A 401 on any call
//! triggers one refresh and one retry of the original request; a second
//! 401 is returned to the caller. Concurrent 401s share a single refresh,
//! since the server treats a second use of a rotated refresh token as theft.

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::ProblemDetails;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{} {}: {}", .0.status, .0.title, .0.detail)]
    Problem(ProblemDetails),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Not logged in")]
    NotAuthenticated,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Problem(problem) => Some(problem.status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    refresh_token: String,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Mutex<Session>,
    /// Held for the duration of a refresh round trip
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: Mutex::new(Session::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Resume a session from previously issued tokens
    pub fn with_tokens(self, access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            session: Mutex::new(Session {
                access_token: Some(access_token.into()),
                refresh_token,
            }),
            ..self
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session.lock().await.access_token.clone()
    }

    /// POST /auth/login; keeps the returned tokens and returns the full `data` payload
    pub async fn login(&self, username: &str, password: &str) -> Result<Value, ClientError> {
        let body = json!({ "username": username, "password": password });
        let response = self.execute(Method::POST, "/auth/login", Some(&body), None).await?;
        let data = envelope_data(read_json(response).await?)?;
        self.store_tokens(&data).await?;
        tracing::debug!(%username, "Logged in");
        Ok(data)
    }

    /// POST /auth/refresh with the stored refresh token
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless another caller already replaced `rejected` while we
    /// waited for the lock
    async fn refresh_after(&self, rejected: Option<&str>) -> Result<(), ClientError> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.access_token().await;
        if current.is_some() && current.as_deref() != rejected {
            return Ok(());
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), ClientError> {
        let refresh_token = self
            .session
            .lock()
            .await
            .refresh_token
            .clone()
            .ok_or(ClientError::NotAuthenticated)?;

        let body = json!({ "refresh_token": refresh_token });
        let response = self.execute(Method::POST, "/auth/refresh", Some(&body), None).await?;
        match read_json(response).await {
            Ok(body) => self.store_tokens(&envelope_data(body)?).await,
            Err(e) => {
                *self.session.lock().await = Session::default();
                Err(e)
            }
        }
    }

    /// POST /auth/logout; the local session is cleared either way
    pub async fn logout(&self) -> Result<(), ClientError> {
        let session = std::mem::take(&mut *self.session.lock().await);
        if let Some(refresh_token) = session.refresh_token {
            let body = json!({ "refresh_token": refresh_token });
            let response = self.execute(Method::POST, "/auth/logout", Some(&body), None).await?;
            read_json(response).await?;
        }
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// `Value::Null` for 204 responses
    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.send(Method::DELETE, path, None).await
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ClientError> {
        let session = self.session.lock().await.clone();
        let response = self
            .execute(method.clone(), path, body, session.access_token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || session.refresh_token.is_none() {
            return read_json(response).await;
        }

        tracing::debug!(%path, "Access token rejected, refreshing");
        self.refresh_after(session.access_token.as_deref()).await?;
        let access_token = self.access_token().await;
        let retry = self.execute(method, path, body, access_token.as_deref()).await?;
        read_json(retry).await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn store_tokens(&self, data: &Value) -> Result<(), ClientError> {
        let tokens: TokenBody =
            serde_json::from_value(data.clone()).map_err(|e| ClientError::Decode(format!("token response: {}", e)))?;
        let mut session = self.session.lock().await;
        session.access_token = Some(tokens.access_token);
        session.refresh_token = Some(tokens.refresh_token);
        Ok(())
    }
}

/// Success bodies as JSON; everything else as a problem
async fn read_json(response: Response) -> Result<Value, ClientError> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    let text = response.text().await?;
    if status.is_success() {
        return serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()));
    }
    Err(ClientError::Problem(parse_problem(status, &text)))
}

/// Bodies that are not problem documents (proxies, HTML error pages) are wrapped
pub fn parse_problem(status: StatusCode, body: &str) -> ProblemDetails {
    serde_json::from_str::<ProblemDetails>(body).unwrap_or_else(|_| ProblemDetails {
        problem_type: "about:blank".to_string(),
        title: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        detail: body.trim().chars().take(500).collect(),
        instance: None,
        correlation_id: None,
        errors: None,
    })
}

fn envelope_data(body: Value) -> Result<Value, ClientError> {
    match body {
        Value::Object(mut map) if map.get("success") == Some(&Value::Bool(true)) => {
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        other => Err(ClientError::Decode(format!("expected success envelope, got {}", other))),
    }
}
