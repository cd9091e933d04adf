use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::product::{CreateProduct, StockAdjustment, UpdateProduct};
use crate::database::models::Product;
use crate::database::{DatabaseError, Repository};
use crate::error::ApiError;
use crate::filter::{DataTablePage, DataTableRequest};
use crate::services::audit_service::{Actor, AuditEntry, AuditService};
use crate::types::AuditAction;

pub struct ProductService {
    pool: PgPool,
    audit: AuditService,
    repo: Repository<Product>,
}

impl ProductService {
    pub fn new(pool: PgPool, audit: AuditService, max_limit: i32) -> Self {
        Self {
            repo: Repository::new(pool.clone(), max_limit),
            pool,
            audit,
        }
    }

    pub async fn list(&self, request: &DataTableRequest, filters: Option<Value>) -> Result<DataTablePage<Product>, ApiError> {
        Ok(self.repo.page(request, filters).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, ApiError> {
        Ok(self.repo.select_404(id.to_string()).await?)
    }

    pub async fn create(&self, input: CreateProduct, actor: &Actor) -> Result<Product, ApiError> {
        let mut tx = self.pool.begin().await?;
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (sku, name, description, category, unit_price, cost_price, stock_quantity, reorder_level, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(input.sku.trim())
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(input.category.as_deref().map(str::trim).filter(|c| !c.is_empty()).unwrap_or("general"))
        .bind(input.unit_price)
        .bind(input.cost_price.unwrap_or(Decimal::ZERO))
        .bind(input.stock_quantity.unwrap_or(0))
        .bind(input.reorder_level.unwrap_or(0))
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::unique_violation(e, "A product with this SKU"))?;

        self.audit
            .record(&mut *tx, AuditEntry::new(actor, AuditAction::Create, "product").entity(product.id).after(&product))
            .await?;
        tx.commit().await?;

        tracing::info!(sku = %product.sku, "Product created");
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, input: UpdateProduct, actor: &Actor) -> Result<Product, ApiError> {
        let mut tx = self.pool.begin().await?;
        let before = lock_product(&mut tx, id).await?;

        let after = sqlx::query_as::<_, Product>(
            "UPDATE products SET \
                sku = COALESCE($2, sku), \
                name = COALESCE($3, name), \
                description = COALESCE($4, description), \
                category = COALESCE($5, category), \
                unit_price = COALESCE($6, unit_price), \
                cost_price = COALESCE($7, cost_price), \
                reorder_level = COALESCE($8, reorder_level), \
                is_active = COALESCE($9, is_active), \
                updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(input.sku.as_deref().map(str::trim))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description.as_deref())
        .bind(input.category.as_deref().map(str::trim))
        .bind(input.unit_price)
        .bind(input.cost_price)
        .bind(input.reorder_level)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::unique_violation(e, "A product with this SKU"))?;

        self.audit
            .record(
                &mut *tx,
                AuditEntry::new(actor, AuditAction::Update, "product").entity(id).before(&before).after(&after),
            )
            .await?;
        tx.commit().await?;
        Ok(after)
    }

    /// Soft delete; the row stays for order history
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        let before = lock_product(&mut tx, id).await?;

        sqlx::query("UPDATE products SET deleted_at = now(), is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        self.audit
            .record(&mut *tx, AuditEntry::new(actor, AuditAction::Delete, "product").entity(id).before(&before))
            .await?;
        tx.commit().await?;

        tracing::info!(sku = %before.sku, "Product deleted");
        Ok(())
    }

    /// Apply a signed stock delta. Stock never goes below zero.
    pub async fn adjust_stock(&self, id: Uuid, input: StockAdjustment, actor: &Actor) -> Result<Product, ApiError> {
        let mut tx = self.pool.begin().await?;
        let before = lock_product(&mut tx, id).await?;

        check_adjustment(before.stock_quantity, input.delta)?;

        let after = sqlx::query_as::<_, Product>(
            "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(input.delta)
        .fetch_one(&mut *tx)
        .await?;

        let entry = AuditEntry::new(actor, AuditAction::StockAdjust, "product").entity(id).changes(json!({
            "delta": input.delta,
            "reason": input.reason,
            "before": before.stock_quantity,
            "after": after.stock_quantity,
        }));
        self.audit.record(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(after)
    }

    /// Active products at or below their reorder level
    pub async fn low_stock(&self) -> Result<Vec<Product>, ApiError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products \
             WHERE deleted_at IS NULL AND is_active AND stock_quantity <= reorder_level \
             ORDER BY stock_quantity ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM products WHERE deleted_at IS NULL ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}

/// The adjusted quantity must stay within `0..=i32::MAX`
fn check_adjustment(on_hand: i32, delta: i32) -> Result<i32, ApiError> {
    let new_quantity = i64::from(on_hand) + i64::from(delta);
    if new_quantity < 0 {
        return Err(ApiError::conflict(format!(
            "Insufficient stock: {} on hand, adjustment of {}",
            on_hand, delta
        )));
    }
    i32::try_from(new_quantity).map_err(|_| {
        ApiError::conflict(format!("Stock cannot exceed {}: {} on hand, adjustment of {}", i32::MAX, on_hand, delta))
    })
}

async fn lock_product(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, id: Uuid) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn adjustments_stay_within_bounds() {
        assert_eq!(check_adjustment(10, -4).unwrap(), 6);
        assert_eq!(check_adjustment(0, i32::MAX).unwrap(), i32::MAX);

        let below = check_adjustment(3, -4).unwrap_err();
        assert_eq!(below.status_code(), StatusCode::CONFLICT);
        assert!(below.message().starts_with("Insufficient stock"));

        let above = check_adjustment(1, i32::MAX).unwrap_err();
        assert_eq!(above.status_code(), StatusCode::CONFLICT);
        assert!(above.message().starts_with("Stock cannot exceed"));
    }
}
