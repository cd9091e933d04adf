//! Dashboard aggregates. Every query is a GROUP BY over the order and
//! product tables; chart payloads use the ApexCharts shapes
//! `{categories, series: [{name, data}]}` and `{labels, series}`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::settings_service::{SettingsService, COMPANY_CURRENCY};
use crate::types::OrderStatus;

pub const DEFAULT_DAYS: i64 = 30;
pub const MAX_DAYS: i64 = 365;
pub const DEFAULT_TOP_LIMIT: i64 = 5;
pub const MAX_TOP_LIMIT: i64 = 50;

pub fn clamp_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Series {
    pub name: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryChart {
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DonutChart {
    pub labels: Vec<String>,
    pub series: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub days: i64,
    pub currency: String,
    pub revenue: Decimal,
    pub order_count: i64,
    pub average_order_value: Decimal,
    pub active_products: i64,
    pub low_stock_count: i64,
    pub inventory_value: Decimal,
    pub pending_customer_orders: i64,
    pub open_supplier_orders: i64,
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    revenue: Decimal,
    order_count: i64,
    active_products: i64,
    low_stock_count: i64,
    inventory_value: Decimal,
    pending_customer_orders: i64,
    open_supplier_orders: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopProducts {
    pub days: i64,
    pub products: Vec<TopProduct>,
    #[serde(flatten)]
    pub chart: CategoryChart,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryInventory {
    pub category: String,
    pub product_count: i64,
    pub units: i64,
    pub stock_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryByCategory {
    pub rows: Vec<CategoryInventory>,
    #[serde(flatten)]
    pub chart: CategoryChart,
}

/// One row per day that had orders
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct DailySales {
    pub day: NaiveDate,
    pub revenue: Decimal,
    pub orders: i64,
}

pub struct InsightsService {
    pool: PgPool,
    settings: SettingsService,
}

impl InsightsService {
    pub fn new(pool: PgPool, settings: SettingsService) -> Self {
        Self { pool, settings }
    }

    pub async fn summary(&self, days: i64) -> Result<Summary, ApiError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT \
                (SELECT COALESCE(SUM(total_amount), 0) FROM customer_orders \
                    WHERE status <> 'cancelled' AND created_at >= $1) AS revenue, \
                (SELECT COUNT(*) FROM customer_orders \
                    WHERE status <> 'cancelled' AND created_at >= $1) AS order_count, \
                (SELECT COUNT(*) FROM products WHERE deleted_at IS NULL AND is_active) AS active_products, \
                (SELECT COUNT(*) FROM products \
                    WHERE deleted_at IS NULL AND is_active AND stock_quantity <= reorder_level) AS low_stock_count, \
                (SELECT COALESCE(SUM(stock_quantity * cost_price), 0) FROM products \
                    WHERE deleted_at IS NULL) AS inventory_value, \
                (SELECT COUNT(*) FROM customer_orders WHERE status = 'pending') AS pending_customer_orders, \
                (SELECT COUNT(*) FROM supplier_orders WHERE status IN ('pending', 'ordered')) AS open_supplier_orders",
        )
        .bind(window_start(days))
        .fetch_one(&self.pool)
        .await?;

        let currency = self.settings.get(COMPANY_CURRENCY).await?;

        Ok(Summary {
            days,
            currency: currency.value.as_str().unwrap_or("USD").to_string(),
            average_order_value: average(row.revenue, row.order_count),
            revenue: row.revenue,
            order_count: row.order_count,
            active_products: row.active_products,
            low_stock_count: row.low_stock_count,
            inventory_value: row.inventory_value,
            pending_customer_orders: row.pending_customer_orders,
            open_supplier_orders: row.open_supplier_orders,
        })
    }

    pub async fn sales_over_time(&self, days: i64) -> Result<CategoryChart, ApiError> {
        let rows = sqlx::query_as::<_, DailySales>(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, \
                COALESCE(SUM(total_amount), 0) AS revenue, COUNT(*) AS orders \
             FROM customer_orders \
             WHERE status <> 'cancelled' AND created_at >= $1 \
             GROUP BY day ORDER BY day",
        )
        .bind(window_start(days))
        .fetch_all(&self.pool)
        .await?;

        Ok(sales_chart(Utc::now().date_naive(), days, &rows))
    }

    pub async fn top_products(&self, days: i64, limit: i64) -> Result<TopProducts, ApiError> {
        let products = sqlx::query_as::<_, TopProduct>(
            "SELECT p.id AS product_id, p.sku, p.name, \
                SUM(i.quantity)::bigint AS quantity, SUM(i.line_total) AS revenue \
             FROM customer_order_items i \
             JOIN customer_orders o ON o.id = i.order_id \
             JOIN products p ON p.id = i.product_id \
             WHERE o.status <> 'cancelled' AND o.created_at >= $1 \
             GROUP BY p.id, p.sku, p.name \
             ORDER BY quantity DESC, revenue DESC \
             LIMIT $2",
        )
        .bind(window_start(days))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let chart = CategoryChart {
            categories: products.iter().map(|p| p.name.clone()).collect(),
            series: vec![
                Series {
                    name: "Units sold".to_string(),
                    data: products.iter().map(|p| p.quantity as f64).collect(),
                },
                Series {
                    name: "Revenue".to_string(),
                    data: products.iter().map(|p| to_f64(p.revenue)).collect(),
                },
            ],
        };
        Ok(TopProducts { days, products, chart })
    }

    pub async fn order_status_breakdown(&self, days: i64) -> Result<DonutChart, ApiError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM customer_orders WHERE created_at >= $1 GROUP BY status",
        )
        .bind(window_start(days))
        .fetch_all(&self.pool)
        .await?;

        Ok(status_donut(&rows))
    }

    pub async fn inventory_by_category(&self) -> Result<InventoryByCategory, ApiError> {
        let rows = sqlx::query_as::<_, CategoryInventory>(
            "SELECT category, COUNT(*) AS product_count, \
                COALESCE(SUM(stock_quantity), 0)::bigint AS units, \
                COALESCE(SUM(stock_quantity * cost_price), 0) AS stock_value \
             FROM products WHERE deleted_at IS NULL \
             GROUP BY category ORDER BY stock_value DESC, category",
        )
        .fetch_all(&self.pool)
        .await?;

        let chart = CategoryChart {
            categories: rows.iter().map(|r| r.category.clone()).collect(),
            series: vec![Series {
                name: "Stock value".to_string(),
                data: rows.iter().map(|r| to_f64(r.stock_value)).collect(),
            }],
        };
        Ok(InventoryByCategory { rows, chart })
    }
}

/// Midnight UTC of the first day in a window of `days` days ending today
fn window_start(days: i64) -> DateTime<Utc> {
    let first = Utc::now().date_naive() - Duration::days(days - 1);
    first.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn average(total: Decimal, count: i64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Revenue and order-count series over `days` days ending `today`, with
/// zeroes for days without orders
pub fn sales_chart(today: NaiveDate, days: i64, rows: &[DailySales]) -> CategoryChart {
    let by_day: HashMap<NaiveDate, &DailySales> = rows.iter().map(|r| (r.day, r)).collect();
    let first = today - Duration::days(days - 1);

    let mut categories = Vec::with_capacity(days as usize);
    let mut revenue = Vec::with_capacity(days as usize);
    let mut orders = Vec::with_capacity(days as usize);
    for offset in 0..days {
        let day = first + Duration::days(offset);
        categories.push(day.format("%Y-%m-%d").to_string());
        match by_day.get(&day) {
            Some(row) => {
                revenue.push(to_f64(row.revenue));
                orders.push(row.orders as f64);
            }
            None => {
                revenue.push(0.0);
                orders.push(0.0);
            }
        }
    }

    CategoryChart {
        categories,
        series: vec![
            Series { name: "Revenue".to_string(), data: revenue },
            Series { name: "Orders".to_string(), data: orders },
        ],
    }
}

/// Every status appears, in lifecycle order, even with a zero count
pub fn status_donut(rows: &[(String, i64)]) -> DonutChart {
    let counts: HashMap<&str, i64> = rows.iter().map(|(s, n)| (s.as_str(), *n)).collect();
    DonutChart {
        labels: OrderStatus::names().iter().map(|s| s.to_string()).collect(),
        series: OrderStatus::ALL
            .iter()
            .map(|s| counts.get(s.as_str()).copied().unwrap_or(0))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_are_clamped() {
        assert_eq!(clamp_days(None), 30);
        assert_eq!(clamp_days(Some(0)), 1);
        assert_eq!(clamp_days(Some(-4)), 1);
        assert_eq!(clamp_days(Some(9999)), 365);
        assert_eq!(clamp_limit(Some(500)), 50);
    }

    #[test]
    fn sales_chart_zero_fills_missing_days() {
        let rows = vec![
            DailySales { day: date(2024, 5, 2), revenue: Decimal::new(1250, 2), orders: 2 },
            DailySales { day: date(2024, 5, 4), revenue: Decimal::new(500, 2), orders: 1 },
        ];
        let chart = sales_chart(date(2024, 5, 4), 4, &rows);
        assert_eq!(chart.categories, vec!["2024-05-01", "2024-05-02", "2024-05-03", "2024-05-04"]);
        assert_eq!(chart.series[0].name, "Revenue");
        assert_eq!(chart.series[0].data, vec![0.0, 12.5, 0.0, 5.0]);
        assert_eq!(chart.series[1].data, vec![0.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn single_day_window() {
        let chart = sales_chart(date(2024, 1, 1), 1, &[]);
        assert_eq!(chart.categories, vec!["2024-01-01"]);
        assert_eq!(chart.series[0].data, vec![0.0]);
    }

    #[test]
    fn donut_lists_every_status() {
        let chart = status_donut(&[("shipped".to_string(), 3), ("pending".to_string(), 1)]);
        assert_eq!(chart.labels, vec!["pending", "processing", "shipped", "delivered", "cancelled"]);
        assert_eq!(chart.series, vec![1, 0, 3, 0, 0]);
    }

    #[test]
    fn average_handles_no_orders() {
        assert_eq!(average(Decimal::ZERO, 0), Decimal::ZERO);
        assert_eq!(average(Decimal::new(1000, 2), 3), Decimal::new(333, 2));
    }

    #[test]
    fn chart_serializes_for_apexcharts() {
        let chart = sales_chart(date(2024, 1, 1), 1, &[]);
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["categories"][0], "2024-01-01");
        assert_eq!(json["series"][1]["name"], "Orders");
    }
}
