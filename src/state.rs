use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::middleware::rate_limit::RateLimits;
use crate::services::{
    AlertService, AuditService, AuthService, CustomerOrderService, InsightsService, ProductService,
    SettingsService, SupplierOrderService, UserService,
};

/// Shared handler state. Cloning is cheap; everything heavy sits behind an `Arc` or the pool.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub tokens: Arc<TokenService>,
    pub rate_limits: Arc<RateLimits>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let tokens = Arc::new(TokenService::new(&config.auth));
        let rate_limits = Arc::new(RateLimits::new(&config.api, &config.auth));
        Self {
            config: Arc::new(config),
            pool,
            tokens,
            rate_limits,
            started_at: Instant::now(),
        }
    }

    fn max_limit(&self) -> i32 {
        self.config.api.max_page_size
    }

    pub fn audit(&self) -> AuditService {
        AuditService::new(self.pool.clone(), self.config.security.enable_audit_logging, self.max_limit())
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.pool.clone(),
            self.tokens.clone(),
            self.audit(),
            self.config.auth.refresh_token_ttl_days,
        )
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.pool.clone(), self.audit(), self.max_limit())
    }

    pub fn products(&self) -> ProductService {
        ProductService::new(self.pool.clone(), self.audit(), self.max_limit())
    }

    pub fn customer_orders(&self) -> CustomerOrderService {
        CustomerOrderService::new(self.pool.clone(), self.audit(), self.max_limit())
    }

    pub fn supplier_orders(&self) -> SupplierOrderService {
        SupplierOrderService::new(self.pool.clone(), self.audit(), self.settings(), self.max_limit())
    }

    pub fn settings(&self) -> SettingsService {
        SettingsService::new(self.pool.clone(), self.audit())
    }

    pub fn insights(&self) -> InsightsService {
        InsightsService::new(self.pool.clone(), self.settings())
    }

    pub fn alerts(&self) -> AlertService {
        AlertService::new(self.pool.clone(), self.settings())
    }
}
