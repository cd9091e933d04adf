use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};

use crate::config::{ApiConfig, AuthConfig};
use crate::error::ApiError;
use crate::middleware::context::client_ip;
use crate::state::AppState;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-client-IP limiters: a general API quota and a stricter login quota
pub struct RateLimits {
    api: Option<KeyedLimiter>,
    login: KeyedLimiter,
    clock: DefaultClock,
}

impl RateLimits {
    pub fn new(api: &ApiConfig, auth: &AuthConfig) -> Self {
        let api_limiter = if api.enable_rate_limiting {
            Some(RateLimiter::keyed(window_quota(api.rate_limit_requests, api.rate_limit_window_secs)))
        } else {
            None
        };
        let login_quota = Quota::per_minute(NonZeroU32::new(auth.login_rate_limit_per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            api: api_limiter,
            login: RateLimiter::keyed(login_quota),
            clock: DefaultClock::default(),
        }
    }

    /// `Err(retry_after_secs)` when the key is over quota
    pub fn check_api(&self, key: &str) -> Result<(), u64> {
        match &self.api {
            Some(limiter) => self.check(limiter, key),
            None => Ok(()),
        }
    }

    pub fn check_login(&self, key: &str) -> Result<(), u64> {
        self.check(&self.login, key)
    }

    /// Number of client keys currently tracked across both limiters
    pub fn tracked_keys(&self) -> usize {
        self.login.len() + self.api.as_ref().map_or(0, |l| l.len())
    }

    /// Forget clients whose quota has fully replenished
    pub fn prune(&self) {
        for limiter in std::iter::once(&self.login).chain(self.api.as_ref()) {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Prune on a fixed interval until the limits are dropped
    pub fn spawn_pruning(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let limits: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(limits) = limits.upgrade() else { break };
                let before = limits.tracked_keys();
                limits.prune();
                tracing::debug!(before, after = limits.tracked_keys(), "Pruned rate limit keys");
            }
        })
    }

    fn check(&self, limiter: &KeyedLimiter, key: &str) -> Result<(), u64> {
        limiter.check_key(&key.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            wait.as_secs().max(1)
        })
    }
}

/// `requests` per `window_secs`, allowing the whole window as a burst
fn window_quota(requests: u32, window_secs: u64) -> Quota {
    let requests = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_secs(window_secs.max(1)) / requests.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(requests))
        .allow_burst(requests)
}

pub async fn api_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_ip(request.headers(), request.extensions());
    if let Err(retry_after) = state.rate_limits.check_api(&key) {
        tracing::warn!(client = %key, path = %request.uri().path(), "API rate limit exceeded");
        return Err(ApiError::too_many_requests("Rate limit exceeded", Some(retry_after)));
    }
    Ok(next.run(request).await)
}

pub async fn login_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_ip(request.headers(), request.extensions());
    if let Err(retry_after) = state.rate_limits.check_login(&key) {
        tracing::warn!(client = %key, "Login rate limit exceeded");
        return Err(ApiError::too_many_requests(
            "Too many login attempts, please try again later",
            Some(retry_after),
        ));
    }
    Ok(next.run(request).await)
}
