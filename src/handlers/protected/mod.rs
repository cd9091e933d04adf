// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind `jwt_auth_middleware`, which inserts the
// `AuthUser` extension. Handlers enforce their own minimum role with
// `AuthUser::require` before touching a service.

pub mod alerts;
pub mod audit;
pub mod auth;
pub mod customer_orders;
pub mod insights;
pub mod products;
pub mod profile;
pub mod settings;
pub mod supplier_orders;
pub mod users;
