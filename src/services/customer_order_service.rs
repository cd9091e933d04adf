use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::customer_order::{CreateCustomerOrder, UpdateOrderStatus};
use crate::database::models::{CustomerOrder, CustomerOrderDetail, CustomerOrderItem, Product};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::{DataTablePage, DataTableRequest};
use crate::services::audit_service::{Actor, AuditEntry, AuditService};
use crate::types::{AuditAction, OrderStatus};
use crate::validation::MAX_AMOUNT;

const ITEMS_SQL: &str = "SELECT i.id, i.order_id, i.product_id, p.sku AS product_sku, p.name AS product_name, \
        i.quantity, i.unit_price, i.line_total \
     FROM customer_order_items i JOIN products p ON p.id = i.product_id \
     WHERE i.order_id = $1 ORDER BY p.name";

pub struct CustomerOrderService {
    pool: PgPool,
    audit: AuditService,
    repo: Repository<CustomerOrder>,
}

impl CustomerOrderService {
    pub fn new(pool: PgPool, audit: AuditService, max_limit: i32) -> Self {
        Self {
            repo: Repository::new(pool.clone(), max_limit),
            pool,
            audit,
        }
    }

    pub async fn list(&self, request: &DataTableRequest, filters: Option<Value>) -> Result<DataTablePage<CustomerOrder>, ApiError> {
        Ok(self.repo.page(request, filters).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<CustomerOrderDetail, ApiError> {
        let order = self.repo.select_404(id.to_string()).await?;
        let items = load_items(&self.pool, id).await?;
        Ok(CustomerOrderDetail { order, items })
    }

    /// Reserve stock and record the order in one transaction
    pub async fn create(&self, input: CreateCustomerOrder, actor: &Actor) -> Result<CustomerOrderDetail, ApiError> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> = input.items.iter().map(|line| line.product_id).collect();
        let products: HashMap<Uuid, Product> =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(input.items.len());
        for (i, line) in input.items.iter().enumerate() {
            let product = products
                .get(&line.product_id)
                .filter(|p| p.deleted_at.is_none() && p.is_active)
                .ok_or_else(|| {
                    ApiError::field_error(format!("items[{}].product_id", i), "Product does not exist or is inactive")
                })?;
            if product.stock_quantity < line.quantity {
                return Err(ApiError::conflict(format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    product.sku, product.stock_quantity, line.quantity
                )));
            }
            let line_total = product.unit_price * Decimal::from(line.quantity);
            total += line_total;
            lines.push((product.id, line.quantity, product.unit_price, line_total));
        }
        if total > MAX_AMOUNT {
            return Err(ApiError::field_error("items", format!("Order total {} exceeds {}", total, MAX_AMOUNT)));
        }

        let order = sqlx::query_as::<_, CustomerOrder>(
            "INSERT INTO customer_orders (customer_name, customer_email, total_amount, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(input.customer_name.trim())
        .bind(input.customer_email.as_deref())
        .bind(total)
        .bind(input.notes.as_deref())
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        for (product_id, quantity, unit_price, line_total) in &lines {
            sqlx::query(
                "INSERT INTO customer_order_items (order_id, product_id, quantity, unit_price, line_total) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order.id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price)
            .bind(line_total)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = now() WHERE id = $1")
                .bind(product_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
        }

        let items = load_items(&mut *tx, order.id).await?;
        let detail = CustomerOrderDetail { order, items };
        self.audit
            .record(
                &mut *tx,
                AuditEntry::new(actor, AuditAction::Create, "customer_order")
                    .entity(detail.order.id)
                    .after(&detail),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(order = %detail.order.order_number, total = %detail.order.total_amount, "Customer order created");
        Ok(detail)
    }

    /// Move along the status machine; cancelling returns the stock
    pub async fn update_status(&self, id: Uuid, input: UpdateOrderStatus, actor: &Actor) -> Result<CustomerOrderDetail, ApiError> {
        let next: OrderStatus = input
            .status
            .parse()
            .map_err(|e: crate::types::UnknownVariant| ApiError::field_error("status", e.to_string()))?;

        let mut tx = self.pool.begin().await?;
        let current = lock_order(&mut tx, id).await?;
        if !current.status.can_transition_to(next) {
            return Err(ApiError::conflict(format!(
                "Cannot change order status from {} to {}",
                current.status, next
            )));
        }

        if next == OrderStatus::Cancelled {
            restore_stock(&mut tx, id).await?;
        }

        let order = sqlx::query_as::<_, CustomerOrder>(
            "UPDATE customer_orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let entry = AuditEntry::new(actor, AuditAction::StatusChange, "customer_order")
            .entity(id)
            .changes(json!({ "from": current.status, "to": next }));
        self.audit.record(&mut *tx, entry).await?;
        tx.commit().await?;

        tracing::info!(order = %order.order_number, from = %current.status, to = %next, "Customer order status changed");
        let items = load_items(&self.pool, id).await?;
        Ok(CustomerOrderDetail { order, items })
    }

    /// Only pending or cancelled orders can be deleted; pending ones give their stock back
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        let order = lock_order(&mut tx, id).await?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Cancelled) {
            return Err(ApiError::conflict(format!(
                "Only pending or cancelled orders can be deleted; this order is {}",
                order.status
            )));
        }

        let items = load_items(&mut *tx, id).await?;
        if order.status.holds_stock() {
            restore_stock(&mut tx, id).await?;
        }
        sqlx::query("DELETE FROM customer_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let detail = CustomerOrderDetail { order, items };
        self.audit
            .record(&mut *tx, AuditEntry::new(actor, AuditAction::Delete, "customer_order").entity(id).before(&detail))
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn load_items<'e, E: PgExecutor<'e>>(executor: E, order_id: Uuid) -> Result<Vec<CustomerOrderItem>, sqlx::Error> {
    sqlx::query_as::<_, CustomerOrderItem>(ITEMS_SQL)
        .bind(order_id)
        .fetch_all(executor)
        .await
}

async fn lock_order(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<CustomerOrder, ApiError> {
    sqlx::query_as::<_, CustomerOrder>("SELECT * FROM customer_orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer order not found"))
}

async fn restore_stock(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<(), ApiError> {
    let overflowing: Option<String> = sqlx::query_scalar(
        "SELECT p.sku FROM products p JOIN customer_order_items i ON i.product_id = p.id \
         WHERE i.order_id = $1 AND p.stock_quantity::bigint + i.quantity > $2 LIMIT 1",
    )
    .bind(order_id)
    .bind(i64::from(i32::MAX))
    .fetch_optional(&mut **tx)
    .await?;
    if let Some(sku) = overflowing {
        return Err(ApiError::conflict(format!("Returning this order's stock would overflow {}", sku)));
    }

    sqlx::query(
        "UPDATE products p SET stock_quantity = p.stock_quantity + i.quantity, updated_at = now() \
         FROM customer_order_items i WHERE i.order_id = $1 AND i.product_id = p.id",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
