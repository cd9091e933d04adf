use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::filter::{ColumnDef, ColumnKind};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub occurred_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub changes: Value,
    pub correlation_id: Option<String>,
    pub ip_address: Option<String>,
}

impl Entity for AuditLog {
    const TABLE: &'static str = "audit_logs";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", ColumnKind::Integer),
        ColumnDef::new("occurred_at", ColumnKind::Timestamp),
        ColumnDef::new("user_id", ColumnKind::Uuid),
        ColumnDef::new("username", ColumnKind::Text),
        ColumnDef::new("action", ColumnKind::Text),
        ColumnDef::new("entity_type", ColumnKind::Text),
        ColumnDef::new("entity_id", ColumnKind::Text),
        ColumnDef::new("correlation_id", ColumnKind::Text),
        ColumnDef::new("ip_address", ColumnKind::Text),
    ];
    const SEARCHABLE: &'static [&'static str] = &["username", "action", "entity_type", "entity_id"];
    const DEFAULT_ORDER: &'static str = "occurred_at desc";
    const LABEL: &'static str = "Audit entry";
}
