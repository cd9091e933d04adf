use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::database::models::AuditLog;
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::filter::{DataTablePage, DataTableRequest};
use crate::types::AuditAction;

/// Who did something, and from where
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub correlation_id: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Option<String>,
    pub changes: Value,
    pub actor: Actor,
}

impl AuditEntry {
    pub fn new(actor: &Actor, action: AuditAction, entity_type: &'static str) -> Self {
        Self {
            action,
            entity_type,
            entity_id: None,
            changes: json!({}),
            actor: actor.clone(),
        }
    }

    pub fn entity(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn changes(mut self, changes: Value) -> Self {
        self.changes = changes;
        self
    }

    /// Snapshot of the entity before the change
    pub fn before<T: serde::Serialize>(self, value: &T) -> Self {
        self.snapshot("before", value)
    }

    /// Snapshot of the entity after the change
    pub fn after<T: serde::Serialize>(self, value: &T) -> Self {
        self.snapshot("after", value)
    }

    fn snapshot<T: serde::Serialize>(mut self, key: &str, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        if !self.changes.is_object() {
            self.changes = Value::Object(Map::new());
        }
        if let Some(map) = self.changes.as_object_mut() {
            map.insert(key.to_string(), value);
        }
        self
    }
}

/// Audit log list filters beyond the DataTables search box
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub username: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let text = |key: &str| params.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(action) = text("action") {
            if action.parse::<AuditAction>().is_err() {
                return Err(ApiError::bad_request(format!(
                    "action must be one of: {}",
                    AuditAction::names().join(", ")
                )));
            }
        }

        Ok(Self {
            entity_type: text("entity_type"),
            action: text("action"),
            username: text("username"),
            from: text("from").map(|v| parse_bound(&v, false)).transpose()?,
            to: text("to").map(|v| parse_bound(&v, true)).transpose()?,
        })
    }

    fn to_where(&self) -> Option<Value> {
        let mut map = Map::new();
        for (key, value) in [
            ("entity_type", &self.entity_type),
            ("action", &self.action),
            ("username", &self.username),
        ] {
            if let Some(v) = value {
                map.insert(key.to_string(), json!(v));
            }
        }

        let mut range = Map::new();
        if let Some(from) = self.from {
            range.insert("$gte".to_string(), json!(from.to_rfc3339()));
        }
        if let Some(to) = self.to {
            range.insert("$lt".to_string(), json!(to.to_rfc3339()));
        }
        if !range.is_empty() {
            map.insert("occurred_at".to_string(), Value::Object(range));
        }

        if map.is_empty() {
            None
        } else {
            Some(Value::Object(map))
        }
    }
}

/// RFC 3339 timestamps are used as-is; a bare date as an upper bound
/// covers that whole day
fn parse_bound(raw: &str, upper: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date '{}', expected YYYY-MM-DD or RFC 3339", raw)))?;
    let date = if upper { date + Duration::days(1) } else { date };
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
    enabled: bool,
    max_limit: i32,
}

impl AuditService {
    pub fn new(pool: PgPool, enabled: bool, max_limit: i32) -> Self {
        Self { pool, enabled, max_limit }
    }

    /// Write an entry on `executor`, usually the transaction holding the change
    pub async fn record<'e, E>(&self, executor: E, entry: AuditEntry) -> Result<(), DatabaseError>
    where
        E: PgExecutor<'e>,
    {
        if !self.enabled && !entry.action.is_security_event() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO audit_logs (user_id, username, action, entity_type, entity_id, changes, correlation_id, ip_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.actor.user_id)
        .bind(&entry.actor.username)
        .bind(entry.action.as_str())
        .bind(entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.changes)
        .bind(&entry.actor.correlation_id)
        .bind(&entry.actor.ip)
        .execute(executor)
        .await?;

        tracing::debug!(action = %entry.action, entity = entry.entity_type, id = ?entry.entity_id, "Audit entry recorded");
        Ok(())
    }

    /// Record on the pool; failures are logged and swallowed so they never
    /// fail an otherwise successful request
    pub async fn record_detached(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.record(&self.pool, entry).await {
            tracing::error!(%action, "Failed to write audit entry: {}", e);
        }
    }

    pub async fn list(&self, request: &DataTableRequest, filter: &AuditFilter) -> Result<DataTablePage<AuditLog>, ApiError> {
        let repo = Repository::<AuditLog>::new(self.pool.clone(), self.max_limit);
        Ok(repo.page(request, filter.to_where()).await?)
    }

    pub async fn get(&self, id: i64) -> Result<AuditLog, ApiError> {
        let repo = Repository::<AuditLog>::new(self.pool.clone(), self.max_limit);
        Ok(repo.select_404(id).await?)
    }
}
