// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service discovery, health checks and token acquisition. The login route
// carries its own rate limit; nothing here reads an `AuthUser`.

pub mod auth;
pub mod health;
pub mod root;

pub use health::{health, health_live};
pub use root::root;
