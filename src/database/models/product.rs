use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::filter::{ColumnDef, ColumnKind};
use crate::validation::{Rules, Validate};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub stock_quantity: i32,
    pub reorder_level: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}

impl Entity for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", ColumnKind::Uuid),
        ColumnDef::new("sku", ColumnKind::Text),
        ColumnDef::new("name", ColumnKind::Text),
        ColumnDef::new("description", ColumnKind::Text),
        ColumnDef::new("category", ColumnKind::Text),
        ColumnDef::new("unit_price", ColumnKind::Numeric),
        ColumnDef::new("cost_price", ColumnKind::Numeric),
        ColumnDef::new("stock_quantity", ColumnKind::Integer),
        ColumnDef::new("reorder_level", ColumnKind::Integer),
        ColumnDef::new("is_active", ColumnKind::Boolean),
        ColumnDef::new("created_at", ColumnKind::Timestamp),
        ColumnDef::new("updated_at", ColumnKind::Timestamp),
    ];
    const SEARCHABLE: &'static [&'static str] = &["sku", "name", "category", "description"];
    const DEFAULT_ORDER: &'static str = "name asc";
    const SOFT_DELETE: bool = true;
    const LABEL: &'static str = "Product";
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub reorder_level: Option<i32>,
    pub is_active: Option<bool>,
}

impl Validate for CreateProduct {
    fn rules(&self, rules: &mut Rules) {
        rules
            .required("sku", &self.sku)
            .length("sku", &self.sku, 1, 64)
            .identifier("sku", &self.sku)
            .required("name", &self.name)
            .length("name", &self.name, 1, 200)
            .max_length("description", self.description.as_deref(), 2000)
            .max_length("category", self.category.as_deref(), 100)
            .money("unit_price", self.unit_price);
        if let Some(cost) = self.cost_price {
            rules.money("cost_price", cost);
        }
        if let Some(stock) = self.stock_quantity {
            rules.min("stock_quantity", stock, 0);
        }
        if let Some(level) = self.reorder_level {
            rules.min("reorder_level", level, 0);
        }
    }
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProduct {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub reorder_level: Option<i32>,
    pub is_active: Option<bool>,
}

impl Validate for UpdateProduct {
    fn rules(&self, rules: &mut Rules) {
        if let Some(sku) = &self.sku {
            rules.length("sku", sku, 1, 64).identifier("sku", sku);
        }
        if let Some(name) = &self.name {
            rules.required("name", name).length("name", name, 1, 200);
        }
        if let Some(category) = &self.category {
            rules.required("category", category).length("category", category, 1, 100);
        }
        rules.max_length("description", self.description.as_deref(), 2000);
        if let Some(price) = self.unit_price {
            rules.money("unit_price", price);
        }
        if let Some(cost) = self.cost_price {
            rules.money("cost_price", cost);
        }
        if let Some(level) = self.reorder_level {
            rules.min("reorder_level", level, 0);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i32,
    pub reason: Option<String>,
}

impl Validate for StockAdjustment {
    fn rules(&self, rules: &mut Rules) {
        rules
            .check("delta", self.delta != 0, "Must not be zero")
            .max_length("reason", self.reason.as_deref(), 500);
    }
}
