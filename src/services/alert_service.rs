use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::settings_service::{SettingsService, LOW_STOCK_THRESHOLD, STALE_AFTER_DAYS};

/// Declared least to most urgent so `Ord` sorts critical last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    OutOfStock,
    LowStock,
    StaleOrder,
    OverdueSupplierOrder,
}

impl AlertKind {
    pub fn severity(self) -> Severity {
        match self {
            AlertKind::OutOfStock => Severity::Critical,
            AlertKind::LowStock | AlertKind::OverdueSupplierOrder => Severity::Warning,
            AlertKind::StaleOrder => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
}

impl Alert {
    fn new(kind: AlertKind, entity_type: &'static str, entity_id: Uuid, title: String, message: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            title,
            message,
            entity_type,
            entity_id,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StockRow {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub stock_quantity: i32,
    pub reorder_level: i32,
}

#[derive(Debug, FromRow)]
struct PendingOrderRow {
    id: Uuid,
    order_number: String,
    customer_name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OverdueRow {
    id: Uuid,
    order_number: String,
    supplier_name: String,
    expected_date: NaiveDate,
}

/// Products without a reorder level fall back to the global threshold
pub fn classify_stock(stock: i32, reorder_level: i32, threshold: i64) -> Option<AlertKind> {
    if stock <= 0 {
        return Some(AlertKind::OutOfStock);
    }
    let limit = if reorder_level > 0 { i64::from(reorder_level) } else { threshold };
    (i64::from(stock) <= limit).then_some(AlertKind::LowStock)
}

pub fn stock_alert(row: &StockRow, threshold: i64) -> Option<Alert> {
    let kind = classify_stock(row.stock_quantity, row.reorder_level, threshold)?;
    let (title, message) = match kind {
        AlertKind::OutOfStock => (
            format!("{} is out of stock", row.name),
            format!("SKU {} has no stock left", row.sku),
        ),
        _ => (
            format!("{} is running low", row.name),
            format!("SKU {} has {} units left", row.sku, row.stock_quantity),
        ),
    };
    Some(Alert::new(kind, "product", row.id, title, message))
}

/// Most severe first; ties keep their query order
pub fn sort_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
}

pub struct AlertService {
    pool: PgPool,
    settings: SettingsService,
}

impl AlertService {
    pub fn new(pool: PgPool, settings: SettingsService) -> Self {
        Self { pool, settings }
    }

    pub async fn list(&self) -> Result<Vec<Alert>, ApiError> {
        let threshold = self.settings.integer(LOW_STOCK_THRESHOLD).await?;
        let stale_after = self.settings.days(STALE_AFTER_DAYS).await?;

        let mut alerts: Vec<Alert> = self
            .stock_rows(threshold)
            .await?
            .iter()
            .filter_map(|row| stock_alert(row, threshold))
            .collect();

        let cutoff = Utc::now()
            .checked_sub_signed(stale_after)
            .ok_or_else(|| ApiError::internal_server_error("Stale order cutoff is out of range"))?;
        let stale = sqlx::query_as::<_, PendingOrderRow>(
            "SELECT id, order_number, customer_name, created_at FROM customer_orders \
             WHERE status = 'pending' AND created_at < $1 ORDER BY created_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        alerts.extend(stale.into_iter().map(|order| {
            let age = (Utc::now() - order.created_at).num_days();
            Alert::new(
                AlertKind::StaleOrder,
                "customer_order",
                order.id,
                format!("Order {} is still pending", order.order_number),
                format!("Placed by {} {} days ago", order.customer_name, age),
            )
        }));

        let overdue = sqlx::query_as::<_, OverdueRow>(
            "SELECT id, order_number, supplier_name, expected_date FROM supplier_orders \
             WHERE status IN ('pending', 'ordered') AND expected_date < CURRENT_DATE ORDER BY expected_date",
        )
        .fetch_all(&self.pool)
        .await?;
        alerts.extend(overdue.into_iter().map(|order| {
            Alert::new(
                AlertKind::OverdueSupplierOrder,
                "supplier_order",
                order.id,
                format!("Supplier order {} is overdue", order.order_number),
                format!("{} was expected on {}", order.supplier_name, order.expected_date),
            )
        }));

        sort_alerts(&mut alerts);
        tracing::debug!(count = alerts.len(), "Alerts computed");
        Ok(alerts)
    }

    async fn stock_rows(&self, threshold: i64) -> Result<Vec<StockRow>, ApiError> {
        Ok(sqlx::query_as::<_, StockRow>(
            "SELECT id, sku, name, stock_quantity, reorder_level FROM products \
             WHERE deleted_at IS NULL AND is_active \
               AND (stock_quantity <= reorder_level OR (reorder_level = 0 AND stock_quantity <= $1)) \
             ORDER BY stock_quantity, name",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(stock: i32, reorder_level: i32) -> StockRow {
        StockRow {
            id: Uuid::new_v4(),
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            stock_quantity: stock,
            reorder_level,
        }
    }

    #[test]
    fn empty_shelves_are_critical() {
        assert_eq!(classify_stock(0, 10, 5), Some(AlertKind::OutOfStock));
        assert_eq!(classify_stock(0, 0, 0), Some(AlertKind::OutOfStock));
    }

    #[test]
    fn reorder_level_wins_over_threshold() {
        assert_eq!(classify_stock(8, 10, 5), Some(AlertKind::LowStock));
        assert_eq!(classify_stock(11, 10, 50), None);
    }

    #[test]
    fn threshold_applies_without_reorder_level() {
        assert_eq!(classify_stock(5, 0, 5), Some(AlertKind::LowStock));
        assert_eq!(classify_stock(6, 0, 5), None);
    }

    #[test]
    fn alerts_sort_critical_first() {
        let mut alerts = vec![
            stock_alert(&row(3, 10), 5).unwrap(),
            Alert::new(AlertKind::StaleOrder, "customer_order", Uuid::new_v4(), "t".into(), "m".into()),
            stock_alert(&row(0, 10), 5).unwrap(),
        ];
        sort_alerts(&mut alerts);
        let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::OutOfStock, AlertKind::LowStock, AlertKind::StaleOrder]);
    }

    #[test]
    fn alert_serializes_kind_and_severity() {
        let alert = stock_alert(&row(2, 4), 5).unwrap();
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "low_stock");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["entity_type"], "product");
        assert_eq!(json["message"], "SKU SKU-1 has 2 units left");
    }
}
