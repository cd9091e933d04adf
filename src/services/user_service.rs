use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{check_password_policy, hash_password, verify_password};
use crate::database::models::user::{ChangePassword, CreateUser, UpdateProfile, UpdateUser};
use crate::database::models::User;
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::filter::{DataTablePage, DataTableRequest};
use crate::services::audit_service::{Actor, AuditEntry, AuditService};
use crate::services::auth_service::AuthService;
use crate::types::{AuditAction, Role};

pub struct UserService {
    pool: PgPool,
    audit: AuditService,
    repo: Repository<User>,
}

impl UserService {
    pub fn new(pool: PgPool, audit: AuditService, max_limit: i32) -> Self {
        Self {
            repo: Repository::new(pool.clone(), max_limit),
            pool,
            audit,
        }
    }

    pub async fn list(&self, request: &DataTableRequest) -> Result<DataTablePage<User>, ApiError> {
        Ok(self.repo.page(request, None).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ApiError> {
        Ok(self.repo.select_404(id.to_string()).await?)
    }

    pub async fn create(&self, input: CreateUser, actor: &Actor) -> Result<User, ApiError> {
        check_password_policy(&input.password)?;
        let role: Role = input
            .role
            .parse()
            .map_err(|e: crate::types::UnknownVariant| ApiError::field_error("role", e.to_string()))?;
        let password_hash = hash_password(&input.password)?;

        let mut tx = self.pool.begin().await?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, display_name, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(input.username.trim())
        .bind(input.email.as_deref().map(str::trim).filter(|e| !e.is_empty()))
        .bind(input.display_name.as_deref().unwrap_or(input.username.trim()))
        .bind(&password_hash)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::unique_violation(e, "Username"))?;

        self.audit
            .record(&mut *tx, AuditEntry::new(actor, AuditAction::Create, "user").entity(user.id).after(&user))
            .await?;
        tx.commit().await?;

        tracing::info!(user = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    /// Admin update of another account. Deactivation revokes refresh tokens;
    /// admins cannot demote or deactivate themselves.
    pub async fn update(&self, id: Uuid, input: UpdateUser, actor: &Actor) -> Result<User, ApiError> {
        let role = input
            .role
            .as_deref()
            .map(|r| r.parse::<Role>())
            .transpose()
            .map_err(|e| ApiError::field_error("role", e.to_string()))?;

        if actor.user_id == Some(id) {
            if matches!(role, Some(r) if r != Role::Admin) {
                return Err(ApiError::conflict("You cannot change your own role"));
            }
            if input.is_active == Some(false) {
                return Err(ApiError::conflict("You cannot deactivate your own account"));
            }
        }

        let mut tx = self.pool.begin().await?;
        let before = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        let after = sqlx::query_as::<_, User>(
            "UPDATE users SET \
                role = COALESCE($2, role), \
                is_active = COALESCE($3, is_active), \
                email = COALESCE($4, email), \
                display_name = COALESCE($5, display_name), \
                updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role.map(|r| r.as_str()))
        .bind(input.is_active)
        .bind(input.email.as_deref())
        .bind(input.display_name.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        if before.is_active && !after.is_active {
            let revoked = AuthService::revoke_all_for(&mut tx, id).await?;
            tracing::info!(user = %after.username, revoked, "User deactivated");
        }

        self.audit
            .record(
                &mut *tx,
                AuditEntry::new(actor, AuditAction::Update, "user").entity(id).before(&before).after(&after),
            )
            .await?;
        tx.commit().await?;
        Ok(after)
    }

    pub async fn update_profile(&self, user_id: Uuid, input: UpdateProfile, actor: &Actor) -> Result<User, ApiError> {
        let update = UpdateUser {
            email: input.email,
            display_name: input.display_name,
            ..Default::default()
        };
        self.update(user_id, update, actor).await
    }

    /// Verify the current password, store the new one and end every session
    pub async fn change_password(&self, user_id: Uuid, input: ChangePassword, actor: &Actor) -> Result<(), ApiError> {
        let user = self.get(user_id).await?;
        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(ApiError::field_error("current_password", "Current password is incorrect"));
        }
        check_password_policy(&input.new_password)
            .map_err(|e| ApiError::field_error("new_password", e.to_string()))?;
        let password_hash = hash_password(&input.new_password)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await?;
        let revoked = AuthService::revoke_all_for(&mut tx, user_id).await?;
        self.audit
            .record(
                &mut *tx,
                AuditEntry::new(actor, AuditAction::PasswordChange, "user")
                    .entity(user_id)
                    .changes(serde_json::json!({ "revoked_tokens": revoked })),
            )
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Create the first admin when the users table is empty
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<Option<User>, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(None);
        }

        let input = CreateUser {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Admin.to_string(),
            email: None,
            display_name: Some("Administrator".to_string()),
        };
        let user = self.create(input, &Actor::default()).await?;
        tracing::warn!(user = %user.username, "Bootstrap admin created; change its password");
        Ok(Some(user))
    }
}

