// auth/mod.rs - credentials, access tokens and refresh tokens
pub mod jwt;
pub mod password;
pub mod refresh;

pub use jwt::{Claims, IssuedToken, TokenService};
pub use password::{check_password_policy, hash_password, verify_password};
pub use refresh::{generate_refresh_token, hash_refresh_token};

use crate::database::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Refresh token has been revoked")]
    RefreshTokenRevoked,

    #[error("Refresh token has expired")]
    RefreshTokenExpired,

    #[error("Refresh token is not recognized")]
    RefreshTokenUnknown,

    #[error("User account is inactive")]
    UserInactive,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(err.into())
    }
}
