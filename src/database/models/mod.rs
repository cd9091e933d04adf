pub mod audit_log;
pub mod customer_order;
pub mod product;
pub mod refresh_token;
pub mod setting;
pub mod supplier_order;
pub mod user;

pub use audit_log::AuditLog;
pub use customer_order::{CustomerOrder, CustomerOrderDetail, CustomerOrderItem};
pub use product::Product;
pub use refresh_token::RefreshToken;
pub use setting::SettingRow;
pub use supplier_order::{SupplierOrder, SupplierOrderDetail, SupplierOrderItem};
pub use user::User;
