// services/mod.rs - Business logic over the connection pool
//
// Handlers parse and authorize; services own transactions, stock
// bookkeeping and audit writes.

pub mod alert_service;
pub mod audit_service;
pub mod auth_service;
pub mod customer_order_service;
pub mod insights_service;
pub mod product_service;
pub mod settings_service;
pub mod supplier_order_service;
pub mod user_service;

pub use alert_service::{Alert, AlertService};
pub use audit_service::{Actor, AuditEntry, AuditFilter, AuditService};
pub use auth_service::{AuthService, TokenPair};
pub use customer_order_service::CustomerOrderService;
pub use insights_service::InsightsService;
pub use product_service::ProductService;
pub use settings_service::{SettingValue, SettingsService, UpdateSetting};
pub use supplier_order_service::SupplierOrderService;
pub use user_service::UserService;
