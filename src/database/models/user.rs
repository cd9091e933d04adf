use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::filter::{ColumnDef, ColumnKind};
use crate::types::Role;
use crate::validation::{Rules, Validate};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", ColumnKind::Uuid),
        ColumnDef::new("username", ColumnKind::Text),
        ColumnDef::new("email", ColumnKind::Text),
        ColumnDef::new("display_name", ColumnKind::Text),
        ColumnDef::new("role", ColumnKind::Text),
        ColumnDef::new("is_active", ColumnKind::Boolean),
        ColumnDef::new("last_login_at", ColumnKind::Timestamp),
        ColumnDef::new("created_at", ColumnKind::Timestamp),
        ColumnDef::new("updated_at", ColumnKind::Timestamp),
    ];
    const SEARCHABLE: &'static [&'static str] = &["username", "email", "display_name"];
    const DEFAULT_ORDER: &'static str = "username asc";
    const LABEL: &'static str = "User";
}

/// Admin-created account
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub role: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Validate for CreateUser {
    fn rules(&self, rules: &mut Rules) {
        rules
            .required("username", &self.username)
            .length("username", &self.username, 3, 50)
            .identifier("username", &self.username)
            .required("password", &self.password)
            .one_of("role", &self.role, &Role::names())
            .email("email", self.email.as_deref())
            .max_length("email", self.email.as_deref(), 254)
            .max_length("display_name", self.display_name.as_deref(), 100);
    }
}

/// Admin changes to another account
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Validate for UpdateUser {
    fn rules(&self, rules: &mut Rules) {
        if let Some(role) = &self.role {
            rules.one_of("role", role, &Role::names());
        }
        rules
            .email("email", self.email.as_deref())
            .max_length("email", self.email.as_deref(), 254)
            .max_length("display_name", self.display_name.as_deref(), 100);
    }
}

/// Self-service profile edits
#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Validate for UpdateProfile {
    fn rules(&self, rules: &mut Rules) {
        rules
            .email("email", self.email.as_deref())
            .max_length("email", self.email.as_deref(), 254)
            .max_length("display_name", self.display_name.as_deref(), 100);
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

impl Validate for ChangePassword {
    fn rules(&self, rules: &mut Rules) {
        rules
            .required("current_password", &self.current_password)
            .required("new_password", &self.new_password)
            .check(
                "new_password",
                self.new_password != self.current_password,
                "New password must differ from the current one",
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: None,
            display_name: "Alice".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Manager,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "manager");
    }

    #[test]
    fn create_user_rules() {
        let bad = CreateUser {
            username: "a b".into(),
            password: "".into(),
            role: "root".into(),
            email: Some("nope".into()),
            display_name: None,
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.get("username").is_some());
        assert!(errors.get("password").is_some());
        assert!(errors.get("role").is_some());
        assert!(errors.get("email").is_some());
    }
}
