use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::SettingRow;
use crate::error::ApiError;
use crate::services::audit_service::{Actor, AuditEntry, AuditService};
use crate::types::AuditAction;
use crate::validation::{Rules, Validate};

pub const COMPANY_NAME: &str = "company.name";
pub const COMPANY_CURRENCY: &str = "company.currency";
pub const LOW_STOCK_THRESHOLD: &str = "inventory.low_stock_threshold";
pub const STALE_AFTER_DAYS: &str = "orders.stale_after_days";
pub const DEFAULT_LEAD_DAYS: &str = "supplier_orders.default_lead_days";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    /// ISO 4217 style, three letters
    Currency,
    /// Zero up to the largest stock quantity
    NonNegativeInteger,
    /// A span of whole days, 1..=MAX_SETTING_DAYS
    Days,
}

/// Ten years; keeps date arithmetic on these settings far from chrono's limits
pub const MAX_SETTING_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy)]
pub enum SettingDefault {
    Text(&'static str),
    Integer(i64),
}

#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub key: &'static str,
    pub kind: SettingKind,
    pub default: SettingDefault,
    pub description: &'static str,
}

pub const SETTINGS: &[SettingDef] = &[
    SettingDef {
        key: COMPANY_NAME,
        kind: SettingKind::Text,
        default: SettingDefault::Text("My Company"),
        description: "Company name shown in the dashboard header",
    },
    SettingDef {
        key: COMPANY_CURRENCY,
        kind: SettingKind::Currency,
        default: SettingDefault::Text("USD"),
        description: "Currency code used for prices and totals",
    },
    SettingDef {
        key: LOW_STOCK_THRESHOLD,
        kind: SettingKind::NonNegativeInteger,
        default: SettingDefault::Integer(5),
        description: "Stock level that triggers an alert for products without a reorder level",
    },
    SettingDef {
        key: STALE_AFTER_DAYS,
        kind: SettingKind::Days,
        default: SettingDefault::Integer(3),
        description: "Days after which a pending customer order is flagged",
    },
    SettingDef {
        key: DEFAULT_LEAD_DAYS,
        kind: SettingKind::Days,
        default: SettingDefault::Integer(14),
        description: "Expected delivery lead time for new supplier orders",
    },
];

impl SettingDef {
    pub fn find(key: &str) -> Option<&'static SettingDef> {
        SETTINGS.iter().find(|def| def.key == key)
    }

    pub fn default_value(&self) -> Value {
        match self.default {
            SettingDefault::Text(s) => json!(s),
            SettingDefault::Integer(n) => json!(n),
        }
    }

    /// Type-check and normalize a submitted value
    pub fn check(&self, value: &Value) -> Result<Value, String> {
        match self.kind {
            SettingKind::Text => match value.as_str().map(str::trim) {
                Some(s) if !s.is_empty() && s.chars().count() <= 200 => Ok(json!(s)),
                _ => Err("Must be a non-empty string of at most 200 characters".to_string()),
            },
            SettingKind::Currency => match value.as_str().map(str::trim) {
                Some(s) if s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()) => Ok(json!(s.to_ascii_uppercase())),
                _ => Err("Must be a three-letter currency code".to_string()),
            },
            SettingKind::NonNegativeInteger => match value.as_i64() {
                Some(n) if (0..=i64::from(i32::MAX)).contains(&n) => Ok(json!(n)),
                _ => Err(format!("Must be an integer between 0 and {}", i32::MAX)),
            },
            SettingKind::Days => match value.as_i64() {
                Some(n) if (1..=MAX_SETTING_DAYS).contains(&n) => Ok(json!(n)),
                _ => Err(format!("Must be a whole number of days between 1 and {}", MAX_SETTING_DAYS)),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingValue {
    pub key: &'static str,
    pub value: Value,
    pub default: Value,
    pub is_default: bool,
    pub description: &'static str,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Uuid>,
}

impl SettingValue {
    fn merge(def: &'static SettingDef, row: Option<&SettingRow>) -> Self {
        // A stored value that no longer type-checks falls back to the default
        let stored = row.and_then(|r| def.check(&r.value).ok());
        Self {
            key: def.key,
            is_default: stored.is_none(),
            value: stored.unwrap_or_else(|| def.default_value()),
            default: def.default_value(),
            description: def.description,
            updated_at: row.map(|r| r.updated_at),
            updated_by: row.and_then(|r| r.updated_by),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSetting {
    pub value: Value,
}

impl Validate for UpdateSetting {
    fn rules(&self, rules: &mut Rules) {
        rules.check("value", !self.value.is_null(), "This field is required");
    }
}

#[derive(Clone)]
pub struct SettingsService {
    pool: PgPool,
    audit: AuditService,
}

impl SettingsService {
    pub fn new(pool: PgPool, audit: AuditService) -> Self {
        Self { pool, audit }
    }

    /// Every known key, stored values merged over defaults
    pub async fn list(&self) -> Result<Vec<SettingValue>, ApiError> {
        let rows: HashMap<String, SettingRow> = sqlx::query_as::<_, SettingRow>("SELECT * FROM system_settings")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| (row.key.clone(), row))
            .collect();

        Ok(SETTINGS
            .iter()
            .map(|def| SettingValue::merge(def, rows.get(def.key)))
            .collect())
    }

    pub async fn get(&self, key: &str) -> Result<SettingValue, ApiError> {
        let def = known(key)?;
        let row = self.load(key).await?;
        Ok(SettingValue::merge(def, row.as_ref()))
    }

    pub async fn put(&self, key: &str, value: Value, actor: &Actor) -> Result<SettingValue, ApiError> {
        let def = known(key)?;
        let value = def.check(&value).map_err(|msg| ApiError::field_error("value", msg))?;

        let mut tx = self.pool.begin().await?;
        let before: Option<Value> = sqlx::query_scalar("SELECT value FROM system_settings WHERE key = $1 FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, SettingRow>(
            "INSERT INTO system_settings (key, value, updated_at, updated_by) VALUES ($1, $2, now(), $3) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now(), updated_by = EXCLUDED.updated_by \
             RETURNING *",
        )
        .bind(key)
        .bind(&value)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let entry = AuditEntry::new(actor, AuditAction::SettingsChange, "setting")
            .entity(key)
            .changes(json!({ "before": before.unwrap_or_else(|| def.default_value()), "after": value }));
        self.audit.record(&mut *tx, entry).await?;
        tx.commit().await?;

        tracing::info!(key, "Setting updated");
        Ok(SettingValue::merge(def, Some(&row)))
    }

    /// Drop the stored value so the default applies again
    pub async fn reset(&self, key: &str, actor: &Actor) -> Result<SettingValue, ApiError> {
        let def = known(key)?;

        let mut tx = self.pool.begin().await?;
        let before: Option<Value> = sqlx::query_scalar("DELETE FROM system_settings WHERE key = $1 RETURNING value")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(before) = before {
            let entry = AuditEntry::new(actor, AuditAction::SettingsChange, "setting")
                .entity(key)
                .changes(json!({ "before": before, "after": def.default_value(), "reset": true }));
            self.audit.record(&mut *tx, entry).await?;
        }
        tx.commit().await?;

        Ok(SettingValue::merge(def, None))
    }

    /// Current integer value of a known integer setting
    pub async fn integer(&self, key: &str) -> Result<i64, ApiError> {
        let setting = self.get(key).await?;
        setting
            .value
            .as_i64()
            .ok_or_else(|| ApiError::internal_server_error(format!("Setting {} is not an integer", key)))
    }

    /// Current value of a day-span setting
    pub async fn days(&self, key: &str) -> Result<Duration, ApiError> {
        let days = self.integer(key).await?;
        Duration::try_days(days)
            .ok_or_else(|| ApiError::internal_server_error(format!("Setting {} is out of range", key)))
    }

    async fn load(&self, key: &str) -> Result<Option<SettingRow>, ApiError> {
        Ok(sqlx::query_as::<_, SettingRow>("SELECT * FROM system_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }
}

fn known(key: &str) -> Result<&'static SettingDef, ApiError> {
    SettingDef::find(key).ok_or_else(|| ApiError::not_found(format!("Unknown setting '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_passes_its_own_check() {
        for def in SETTINGS {
            assert_eq!(def.check(&def.default_value()).unwrap(), def.default_value(), "{}", def.key);
        }
    }

    #[test]
    fn currency_is_normalized() {
        let def = SettingDef::find(COMPANY_CURRENCY).unwrap();
        assert_eq!(def.check(&json!("eur")).unwrap(), json!("EUR"));
        assert!(def.check(&json!("EURO")).is_err());
        assert!(def.check(&json!(978)).is_err());
    }

    #[test]
    fn integer_kinds() {
        let threshold = SettingDef::find(LOW_STOCK_THRESHOLD).unwrap();
        assert!(threshold.check(&json!(0)).is_ok());
        assert!(threshold.check(&json!(-1)).is_err());
        assert!(threshold.check(&json!("5")).is_err());

        assert!(threshold.check(&json!(i64::from(i32::MAX) + 1)).is_err());

        let stale = SettingDef::find(STALE_AFTER_DAYS).unwrap();
        assert!(stale.check(&json!(0)).is_err());
        assert!(stale.check(&json!(1.5)).is_err());
        assert_eq!(stale.check(&json!(MAX_SETTING_DAYS)).unwrap(), json!(MAX_SETTING_DAYS));
    }

    #[test]
    fn day_spans_are_bounded() {
        for key in [STALE_AFTER_DAYS, DEFAULT_LEAD_DAYS] {
            let def = SettingDef::find(key).unwrap();
            assert!(def.check(&json!(100_000_000)).is_err(), "{}", key);
            assert!(def.check(&json!(MAX_SETTING_DAYS + 1)).is_err(), "{}", key);
        }
    }

    #[test]
    fn oversized_stored_day_span_falls_back_to_default() {
        let def = SettingDef::find(STALE_AFTER_DAYS).unwrap();
        let row = SettingRow {
            key: STALE_AFTER_DAYS.to_string(),
            value: json!(100_000_000),
            updated_at: Utc::now(),
            updated_by: None,
        };
        let merged = SettingValue::merge(def, Some(&row));
        assert!(merged.is_default);
        assert_eq!(merged.value, json!(3));
    }

    #[test]
    fn merge_falls_back_to_default() {
        let def = SettingDef::find(COMPANY_NAME).unwrap();
        let merged = SettingValue::merge(def, None);
        assert!(merged.is_default);
        assert_eq!(merged.value, json!("My Company"));

        let row = SettingRow {
            key: COMPANY_NAME.to_string(),
            value: json!("Acme Ltd"),
            updated_at: Utc::now(),
            updated_by: None,
        };
        let merged = SettingValue::merge(def, Some(&row));
        assert!(!merged.is_default);
        assert_eq!(merged.value, json!("Acme Ltd"));
    }

    #[test]
    fn unknown_keys_are_not_found() {
        assert_eq!(known("nope").unwrap_err().status_code(), axum::http::StatusCode::NOT_FOUND);
    }
}
