use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::config::AuthConfig;
use crate::types::Role;

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

/// Signs and verifies HS256 access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            ttl: Duration::minutes(config.access_token_ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: Uuid, username: &str, role: Role) -> Result<IssuedToken, AuthError> {
        self.issue_at(user_id, username, role, Utc::now())
    }

    fn issue_at(&self, user_id: Uuid, username: &str, role: Role, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Check signature, expiry and issuer
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = 5;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn service() -> TokenService {
        TokenService::new(&AppConfig::development().auth)
    }

    #[test]
    fn issued_token_verifies() {
        let svc = service();
        let id = Uuid::new_v4();
        let issued = svc.issue(id, "alice", Role::Manager).unwrap();
        let claims = svc.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.iss, "bizadmin-api");
        assert_eq!(issued.expires_in, 60 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let issued = svc
            .issue_at(Uuid::new_v4(), "alice", Role::Viewer, Utc::now() - Duration::hours(3))
            .unwrap();
        assert!(matches!(svc.verify(&issued.token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn wrong_secret_or_issuer_is_rejected() {
        let svc = service();
        let issued = svc.issue(Uuid::new_v4(), "alice", Role::Admin).unwrap();

        let mut other = AppConfig::development().auth;
        other.jwt_secret = "another-secret-that-is-long-enough-for-hs256".to_string();
        assert!(matches!(TokenService::new(&other).verify(&issued.token), Err(AuthError::InvalidToken(_))));

        let mut other = AppConfig::development().auth;
        other.jwt_issuer = "someone-else".to_string();
        assert!(matches!(TokenService::new(&other).verify(&issued.token), Err(AuthError::InvalidToken(_))));

        assert!(svc.verify("not.a.jwt").is_err());
    }
}
