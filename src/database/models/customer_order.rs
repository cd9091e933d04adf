use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::filter::{ColumnDef, ColumnKind};
use crate::types::OrderStatus;
use crate::validation::{Rules, Validate};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for CustomerOrder {
    const TABLE: &'static str = "customer_orders";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", ColumnKind::Uuid),
        ColumnDef::new("order_number", ColumnKind::Text),
        ColumnDef::new("customer_name", ColumnKind::Text),
        ColumnDef::new("customer_email", ColumnKind::Text),
        ColumnDef::new("status", ColumnKind::Text),
        ColumnDef::new("total_amount", ColumnKind::Numeric),
        ColumnDef::new("created_by", ColumnKind::Uuid),
        ColumnDef::new("created_at", ColumnKind::Timestamp),
        ColumnDef::new("updated_at", ColumnKind::Timestamp),
    ];
    const SEARCHABLE: &'static [&'static str] = &["order_number", "customer_name", "customer_email"];
    const DEFAULT_ORDER: &'static str = "created_at desc";
    const LABEL: &'static str = "Customer order";
}

/// Order line joined with the product it refers to
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerOrderDetail {
    #[serde(flatten)]
    pub order: CustomerOrder,
    pub items: Vec<CustomerOrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerOrder {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl Validate for OrderLine {
    fn rules(&self, rules: &mut Rules) {
        rules.range("quantity", self.quantity, 1, 100_000);
    }
}

impl Validate for CreateCustomerOrder {
    fn rules(&self, rules: &mut Rules) {
        rules
            .required("customer_name", &self.customer_name)
            .length("customer_name", &self.customer_name, 1, 200)
            .email("customer_email", self.customer_email.as_deref())
            .max_length("notes", self.notes.as_deref(), 2000)
            .not_empty("items", &self.items)
            .nested("items", &self.items);

        let mut seen = std::collections::HashSet::new();
        let unique = self.items.iter().all(|line| seen.insert(line.product_id));
        rules.check("items", unique, "Each product may appear only once");
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatus {
    pub status: String,
}

impl Validate for UpdateOrderStatus {
    fn rules(&self, rules: &mut Rules) {
        rules.one_of("status", &self.status, &OrderStatus::names());
    }
}
