use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::filter::{ColumnDef, ColumnKind};
use crate::types::SupplierOrderStatus;
use crate::validation::{Rules, Validate};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplierOrder {
    pub id: Uuid,
    pub order_number: String,
    pub supplier_name: String,
    pub supplier_email: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: SupplierOrderStatus,
    pub expected_date: Option<NaiveDate>,
    pub total_cost: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for SupplierOrder {
    const TABLE: &'static str = "supplier_orders";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", ColumnKind::Uuid),
        ColumnDef::new("order_number", ColumnKind::Text),
        ColumnDef::new("supplier_name", ColumnKind::Text),
        ColumnDef::new("supplier_email", ColumnKind::Text),
        ColumnDef::new("status", ColumnKind::Text),
        ColumnDef::new("expected_date", ColumnKind::Date),
        ColumnDef::new("total_cost", ColumnKind::Numeric),
        ColumnDef::new("received_at", ColumnKind::Timestamp),
        ColumnDef::new("created_at", ColumnKind::Timestamp),
        ColumnDef::new("updated_at", ColumnKind::Timestamp),
    ];
    const SEARCHABLE: &'static [&'static str] = &["order_number", "supplier_name", "supplier_email"];
    const DEFAULT_ORDER: &'static str = "created_at desc";
    const LABEL: &'static str = "Supplier order";
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplierOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplierOrderDetail {
    #[serde(flatten)]
    pub order: SupplierOrder,
    pub items: Vec<SupplierOrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierOrder {
    pub supplier_name: String,
    pub supplier_email: Option<String>,
    /// Defaults to today plus `supplier_orders.default_lead_days`
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<SupplierOrderLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

impl Validate for SupplierOrderLine {
    fn rules(&self, rules: &mut Rules) {
        rules
            .range("quantity", self.quantity, 1, 1_000_000)
            .money("unit_cost", self.unit_cost);
    }
}

impl Validate for CreateSupplierOrder {
    fn rules(&self, rules: &mut Rules) {
        rules
            .required("supplier_name", &self.supplier_name)
            .length("supplier_name", &self.supplier_name, 1, 200)
            .email("supplier_email", self.supplier_email.as_deref())
            .max_length("notes", self.notes.as_deref(), 2000)
            .not_empty("items", &self.items)
            .nested("items", &self.items);

        let mut seen = std::collections::HashSet::new();
        let unique = self.items.iter().all(|line| seen.insert(line.product_id));
        rules.check("items", unique, "Each product may appear only once");
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSupplierOrderStatus {
    pub status: String,
}

impl Validate for UpdateSupplierOrderStatus {
    fn rules(&self, rules: &mut Rules) {
        rules.one_of("status", &self.status, &SupplierOrderStatus::names());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn supplier_lines_need_positive_quantity_and_cost() {
        let body: CreateSupplierOrder = serde_json::from_value(json!({
            "supplier_name": "Parts Co",
            "expected_date": "2024-06-01",
            "items": [{ "product_id": Uuid::new_v4(), "quantity": 0, "unit_cost": "-1.00" }]
        }))
        .unwrap();
        let errors = body.validate().unwrap_err();
        assert!(errors.get("items[0].quantity").is_some());
        assert!(errors.get("items[0].unit_cost").is_some());
        assert_eq!(body.expected_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[test]
    fn unit_cost_must_fit_the_column() {
        let line: SupplierOrderLine = serde_json::from_value(json!({
            "product_id": Uuid::new_v4(),
            "quantity": 1,
            "unit_cost": "99999999999999"
        }))
        .unwrap();
        assert!(line.validate().unwrap_err().get("unit_cost").is_some());
    }

    #[test]
    fn status_must_be_known() {
        assert!(UpdateSupplierOrderStatus { status: "received".into() }.validate().is_ok());
        assert!(UpdateSupplierOrderStatus { status: "shipped".into() }.validate().is_err());
    }
}
