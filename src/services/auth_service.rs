use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::{generate_refresh_token, hash_refresh_token, verify_password, AuthError, TokenService};
use crate::database::models::{RefreshToken, User};
use crate::database::DatabaseError;
use crate::services::audit_service::{Actor, AuditEntry, AuditService};
use crate::types::AuditAction;

/// Body returned by login and refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub user: User,
}

pub struct AuthService {
    pool: PgPool,
    tokens: Arc<TokenService>,
    audit: AuditService,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(pool: PgPool, tokens: Arc<TokenService>, audit: AuditService, refresh_ttl_days: i64) -> Self {
        Self {
            pool,
            tokens,
            audit,
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    /// Unknown users, wrong passwords and inactive accounts all fail the same way
    pub async fn login(&self, username: &str, password: &str, actor: &Actor) -> Result<TokenPair, AuthError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(username) = lower($1)")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                self.login_failed(username, "invalid credentials", actor).await;
                return Err(AuthError::InvalidCredentials);
            }
        };
        if !user.is_active {
            self.login_failed(username, "inactive account", actor).await;
            return Err(AuthError::InvalidCredentials);
        }

        let mut tx = self.pool.begin().await?;
        let user = sqlx::query_as::<_, User>("UPDATE users SET last_login_at = now() WHERE id = $1 RETURNING *")
            .bind(user.id)
            .fetch_one(&mut *tx)
            .await?;
        let (refresh_token, stored) = self.insert_refresh_token(&mut tx, user.id, actor.ip.as_deref()).await?;

        let actor = Actor {
            user_id: Some(user.id),
            username: Some(user.username.clone()),
            ..actor.clone()
        };
        self.audit
            .record(&mut *tx, AuditEntry::new(&actor, AuditAction::Login, "user").entity(user.id))
            .await?;
        tx.commit().await?;

        tracing::info!(user = %user.username, "User logged in");
        self.token_pair(user, refresh_token, stored.expires_at)
    }

    /// Rotate a refresh token. Presenting a revoked token revokes every live
    /// token of its owner.
    pub async fn refresh(&self, presented: &str, actor: &Actor) -> Result<TokenPair, AuthError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1 FOR UPDATE")
            .bind(hash_refresh_token(presented))
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AuthError::RefreshTokenUnknown)?;

        if current.is_revoked() {
            let revoked = Self::revoke_all_for(&mut tx, current.user_id).await?;
            let entry = AuditEntry::new(actor, AuditAction::TokenReuse, "user")
                .entity(current.user_id)
                .changes(json!({ "token_id": current.id, "revoked_tokens": revoked }));
            self.audit.record(&mut *tx, entry).await?;
            tx.commit().await?;
            tracing::warn!(user_id = %current.user_id, revoked, "Revoked refresh token presented again");
            return Err(AuthError::RefreshTokenRevoked);
        }
        if current.is_expired_at(Utc::now()) {
            return Err(AuthError::RefreshTokenExpired);
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(current.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AuthError::RefreshTokenUnknown)?;
        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        let (refresh_token, stored) = self.insert_refresh_token(&mut tx, user.id, actor.ip.as_deref()).await?;
        sqlx::query("UPDATE refresh_tokens SET revoked_at = now(), replaced_by = $2 WHERE id = $1")
            .bind(current.id)
            .bind(stored.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(user = %user.username, "Refresh token rotated");
        self.token_pair(user, refresh_token, stored.expires_at)
    }

    /// Idempotent; unknown or already revoked tokens are ignored
    pub async fn logout(&self, presented: &str, actor: &Actor) -> Result<(), AuthError> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE refresh_tokens SET revoked_at = now() WHERE token_hash = $1 AND revoked_at IS NULL RETURNING user_id",
        )
        .bind(hash_refresh_token(presented))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user_id) = user_id {
            let actor = Actor { user_id: Some(user_id), ..actor.clone() };
            self.audit
                .record_detached(AuditEntry::new(&actor, AuditAction::Logout, "user").entity(user_id))
                .await;
        }
        Ok(())
    }

    /// Revoke every live refresh token of the user; returns how many were revoked
    pub async fn logout_all(&self, user_id: Uuid, actor: &Actor) -> Result<u64, AuthError> {
        let mut tx = self.pool.begin().await?;
        let revoked = Self::revoke_all_for(&mut tx, user_id).await?;
        let entry = AuditEntry::new(actor, AuditAction::Logout, "user")
            .entity(user_id)
            .changes(json!({ "all_sessions": true, "revoked_tokens": revoked }));
        self.audit.record(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(revoked)
    }

    pub async fn me(&self, user_id: Uuid) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AuthError::Database(DatabaseError::NotFound("User not found".to_string())))
    }

    pub(crate) async fn revoke_all_for(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked_at = now() WHERE user_id = $1 AND revoked_at IS NULL")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_refresh_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ip: Option<&str>,
    ) -> Result<(String, RefreshToken), AuthError> {
        let token = generate_refresh_token();
        let stored = sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_by_ip) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(user_id)
        .bind(hash_refresh_token(&token))
        .bind(Utc::now() + self.refresh_ttl)
        .bind(ip)
        .fetch_one(&mut **tx)
        .await?;
        Ok((token, stored))
    }

    fn token_pair(&self, user: User, refresh_token: String, refresh_expires_at: DateTime<Utc>) -> Result<TokenPair, AuthError> {
        let access = self.tokens.issue(user.id, &user.username, user.role)?;
        Ok(TokenPair {
            access_token: access.token,
            token_type: "Bearer",
            expires_in: access.expires_in,
            refresh_token,
            refresh_expires_at,
            user,
        })
    }

    async fn login_failed(&self, username: &str, reason: &str, actor: &Actor) {
        tracing::warn!(user = %username, ip = ?actor.ip, reason, "Login failed");
        let actor = Actor { username: Some(username.to_string()), ..actor.clone() };
        self.audit
            .record_detached(AuditEntry::new(&actor, AuditAction::LoginFailed, "user").changes(json!({ "reason": reason })))
            .await;
    }
}
