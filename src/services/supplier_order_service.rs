use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::supplier_order::{CreateSupplierOrder, UpdateSupplierOrderStatus};
use crate::database::models::{SupplierOrder, SupplierOrderDetail, SupplierOrderItem};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::{DataTablePage, DataTableRequest};
use crate::services::audit_service::{Actor, AuditEntry, AuditService};
use crate::services::settings_service::{SettingsService, DEFAULT_LEAD_DAYS};
use crate::types::{AuditAction, SupplierOrderStatus};
use crate::validation::MAX_AMOUNT;

const ITEMS_SQL: &str = "SELECT i.id, i.order_id, i.product_id, p.sku AS product_sku, p.name AS product_name, \
        i.quantity, i.unit_cost, i.line_total \
     FROM supplier_order_items i JOIN products p ON p.id = i.product_id \
     WHERE i.order_id = $1 ORDER BY p.name";

pub struct SupplierOrderService {
    pool: PgPool,
    audit: AuditService,
    settings: SettingsService,
    repo: Repository<SupplierOrder>,
}

impl SupplierOrderService {
    pub fn new(pool: PgPool, audit: AuditService, settings: SettingsService, max_limit: i32) -> Self {
        Self {
            repo: Repository::new(pool.clone(), max_limit),
            pool,
            audit,
            settings,
        }
    }

    pub async fn list(&self, request: &DataTableRequest, filters: Option<Value>) -> Result<DataTablePage<SupplierOrder>, ApiError> {
        Ok(self.repo.page(request, filters).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<SupplierOrderDetail, ApiError> {
        let order = self.repo.select_404(id.to_string()).await?;
        let items = load_items(&self.pool, id).await?;
        Ok(SupplierOrderDetail { order, items })
    }

    pub async fn create(&self, input: CreateSupplierOrder, actor: &Actor) -> Result<SupplierOrderDetail, ApiError> {
        let expected_date = match input.expected_date {
            Some(date) => date,
            None => {
                let lead_time = self.settings.days(DEFAULT_LEAD_DAYS).await?;
                Utc::now()
                    .date_naive()
                    .checked_add_signed(lead_time)
                    .ok_or_else(|| ApiError::internal_server_error("Expected date is out of range"))?
            }
        };

        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> = input.items.iter().map(|line| line.product_id).collect();
        let known: HashSet<Uuid> =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = ANY($1) AND deleted_at IS NULL")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();
        if let Some(i) = input.items.iter().position(|line| !known.contains(&line.product_id)) {
            return Err(ApiError::field_error(format!("items[{}].product_id", i), "Product does not exist"));
        }

        let total: Decimal = input
            .items
            .iter()
            .map(|line| line.unit_cost * Decimal::from(line.quantity))
            .sum();
        if total > MAX_AMOUNT {
            return Err(ApiError::field_error("items", format!("Order total {} exceeds {}", total, MAX_AMOUNT)));
        }

        let order = sqlx::query_as::<_, SupplierOrder>(
            "INSERT INTO supplier_orders (supplier_name, supplier_email, expected_date, total_cost, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(input.supplier_name.trim())
        .bind(input.supplier_email.as_deref())
        .bind(expected_date)
        .bind(total)
        .bind(input.notes.as_deref())
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.items {
            sqlx::query(
                "INSERT INTO supplier_order_items (order_id, product_id, quantity, unit_cost, line_total) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(line.unit_cost * Decimal::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        let items = load_items(&mut *tx, order.id).await?;
        let detail = SupplierOrderDetail { order, items };
        self.audit
            .record(
                &mut *tx,
                AuditEntry::new(actor, AuditAction::Create, "supplier_order")
                    .entity(detail.order.id)
                    .after(&detail),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(order = %detail.order.order_number, supplier = %detail.order.supplier_name, "Supplier order created");
        Ok(detail)
    }

    /// Receiving books the goods into stock and refreshes product cost prices
    pub async fn update_status(
        &self,
        id: Uuid,
        input: UpdateSupplierOrderStatus,
        actor: &Actor,
    ) -> Result<SupplierOrderDetail, ApiError> {
        let next: SupplierOrderStatus = input
            .status
            .parse()
            .map_err(|e: crate::types::UnknownVariant| ApiError::field_error("status", e.to_string()))?;

        let mut tx = self.pool.begin().await?;
        let current = lock_order(&mut tx, id).await?;
        if !current.status.can_transition_to(next) {
            return Err(ApiError::conflict(format!(
                "Cannot change supplier order status from {} to {}",
                current.status, next
            )));
        }

        if next == SupplierOrderStatus::Received {
            let overflowing: Option<String> = sqlx::query_scalar(
                "SELECT p.sku FROM products p JOIN supplier_order_items i ON i.product_id = p.id \
                 WHERE i.order_id = $1 AND p.stock_quantity::bigint + i.quantity > $2 LIMIT 1",
            )
            .bind(id)
            .bind(i64::from(i32::MAX))
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(sku) = overflowing {
                return Err(ApiError::conflict(format!("Receiving this order would overflow the stock of {}", sku)));
            }

            sqlx::query(
                "UPDATE products p SET stock_quantity = p.stock_quantity + i.quantity, cost_price = i.unit_cost, \
                    updated_at = now() \
                 FROM supplier_order_items i WHERE i.order_id = $1 AND i.product_id = p.id",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let order = sqlx::query_as::<_, SupplierOrder>(
            "UPDATE supplier_orders SET status = $2, \
                received_at = CASE WHEN $2 = 'received' THEN now() ELSE received_at END, \
                updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let entry = AuditEntry::new(actor, AuditAction::StatusChange, "supplier_order")
            .entity(id)
            .changes(json!({ "from": current.status, "to": next }));
        self.audit.record(&mut *tx, entry).await?;
        tx.commit().await?;

        tracing::info!(order = %order.order_number, from = %current.status, to = %next, "Supplier order status changed");
        let items = load_items(&self.pool, id).await?;
        Ok(SupplierOrderDetail { order, items })
    }

    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        let order = lock_order(&mut tx, id).await?;
        if !matches!(order.status, SupplierOrderStatus::Pending | SupplierOrderStatus::Cancelled) {
            return Err(ApiError::conflict(format!(
                "Only pending or cancelled supplier orders can be deleted; this order is {}",
                order.status
            )));
        }

        let items = load_items(&mut *tx, id).await?;
        sqlx::query("DELETE FROM supplier_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let detail = SupplierOrderDetail { order, items };
        self.audit
            .record(&mut *tx, AuditEntry::new(actor, AuditAction::Delete, "supplier_order").entity(id).before(&detail))
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn load_items<'e, E: PgExecutor<'e>>(executor: E, order_id: Uuid) -> Result<Vec<SupplierOrderItem>, sqlx::Error> {
    sqlx::query_as::<_, SupplierOrderItem>(ITEMS_SQL)
        .bind(order_id)
        .fetch_all(executor)
        .await
}

async fn lock_order(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<SupplierOrder, ApiError> {
    sqlx::query_as::<_, SupplierOrder>("SELECT * FROM supplier_orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Supplier order not found"))
}
