//! Read-side aggregates for statistics, dashboard and alerts.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use stockroom_core::{DomainError, DomainResult, ProductId};
use stockroom_inventory::{Category, MovementType, Product};

/// Days covered by `top_products` and `movements_by_type`.
pub const DASHBOARD_WINDOW_DAYS: i64 = 30;
/// Points in `inventory_value_trend`, ending today.
pub const VALUE_TREND_DAYS: i64 = 7;
pub const TOP_LIMIT: usize = 5;
pub const ALERT_LIMIT: usize = 10;

/// Registry totals over live (non-deleted, active) products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStatistics {
    pub total_products: u64,
    pub total_value: Decimal,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
    pub average_price: Decimal,
    pub total_stock: i64,
}

/// Ledger totals. Entradas/salidas are unit counts for increase/decrease
/// types; absolute counts (`ajuste`) are in neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementStatistics {
    pub total_movements: u64,
    pub total_entradas: i64,
    pub total_salidas: i64,
    pub products_affected: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub products_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub total_outbound: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStatistics {
    pub total_products: u64,
    pub total_categories: u64,
    pub total_users: u64,
    pub total_value: Decimal,
    pub low_stock_products: u64,
    pub out_of_stock_products: u64,
    pub today_movements: u64,
    pub top_products: Vec<TopProduct>,
    pub top_categories: Vec<CategorySummary>,
    pub movements_by_type: Vec<TypeCount>,
    pub inventory_value_trend: Vec<ValuePoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockAlerts {
    pub low_stock_alerts: Vec<Product>,
    pub out_of_stock_alerts: Vec<Product>,
}

/// `total / count`, rounded to cents; zero for an empty set.
pub fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (total / Decimal::from(count)).round_dp(2)
}

/// Sum that fails instead of overflowing.
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> DomainResult<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| DomainError::invalid_field("total_value", "inventory value is out of range"))
    })
}

/// Stock valued at sale price across `products`.
pub fn inventory_value<'a>(products: impl IntoIterator<Item = &'a Product>) -> DomainResult<Decimal> {
    let values = products
        .into_iter()
        .map(Product::total_value)
        .collect::<DomainResult<Vec<_>>>()?;
    checked_sum(values)
}

/// Drop empty buckets and order by the canonical type order.
pub fn type_counts(counts: impl IntoIterator<Item = (MovementType, u64)>) -> Vec<TypeCount> {
    let counts: Vec<(MovementType, u64)> = counts.into_iter().collect();
    MovementType::ALL
        .into_iter()
        .filter_map(|t| {
            let count: u64 = counts.iter().filter(|(k, _)| *k == t).map(|(_, c)| c).sum();
            (count > 0).then_some(TypeCount { movement_type: t, count })
        })
        .collect()
}
