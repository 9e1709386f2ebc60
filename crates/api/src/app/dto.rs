use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use stockroom_core::{CategoryId, DomainError, DomainResult};
use stockroom_infra::Page;
use stockroom_inventory::{
    Category, CategoryPatch, MovementType, NewCategory, NewProduct, Product, ProductPatch, StockAdjustment,
    StockMovement, DEFAULT_MINIMUM_STOCK,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 100, message = "sku must be 1 to 100 characters"))]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    #[validate(range(min = 0, message = "stock_quantity cannot be negative"))]
    pub stock_quantity: Option<i64>,
    #[validate(range(min = 0, message = "minimum_stock cannot be negative"))]
    pub minimum_stock: Option<i64>,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(length(max = 255))]
    pub image_url: Option<String>,
    #[validate(length(max = 100))]
    pub barcode: Option<String>,
    #[validate(length(max = 50))]
    pub unit: Option<String>,
    pub weight: Option<Decimal>,
    #[validate(length(max = 100))]
    pub dimensions: Option<String>,
    pub is_active: Option<bool>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(r: CreateProductRequest) -> Self {
        NewProduct {
            sku: r.sku,
            name: r.name,
            description: r.description,
            category_id: r.category_id,
            stock_quantity: r.stock_quantity.unwrap_or(0),
            minimum_stock: r.minimum_stock.unwrap_or(DEFAULT_MINIMUM_STOCK),
            price: r.price,
            cost_price: r.cost_price,
            location: r.location,
            image_url: r.image_url,
            barcode: r.barcode,
            unit: r.unit,
            weight: r.weight,
            dimensions: r.dimensions,
            is_active: r.is_active,
        }
    }
}

/// Partial update. An explicit `null` clears a nullable field; an absent key leaves it alone.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 100, message = "sku must be 1 to 100 characters"))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<CategoryId>>,
    #[validate(range(min = 0, message = "stock_quantity cannot be negative"))]
    pub stock_quantity: Option<i64>,
    #[validate(range(min = 0, message = "minimum_stock cannot be negative"))]
    pub minimum_stock: Option<i64>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub cost_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub barcode: Option<Option<String>>,
    #[validate(length(max = 50))]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub weight: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub dimensions: Option<Option<String>>,
    pub is_active: Option<bool>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(r: UpdateProductRequest) -> Self {
        ProductPatch {
            sku: r.sku,
            name: r.name,
            description: r.description,
            category_id: r.category_id,
            stock_quantity: r.stock_quantity,
            minimum_stock: r.minimum_stock,
            price: r.price,
            cost_price: r.cost_price,
            location: r.location,
            image_url: r.image_url,
            barcode: r.barcode,
            unit: r.unit,
            weight: r.weight,
            dimensions: r.dimensions,
            is_active: r.is_active,
            reason: r.reason,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockAdjustmentRequest {
    pub quantity: i64,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

impl From<StockAdjustmentRequest> for StockAdjustment {
    fn from(r: StockAdjustmentRequest) -> Self {
        StockAdjustment {
            movement_type: r.movement_type,
            quantity: r.quantity,
            reason: r.reason,
            reference: r.reference,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
}

impl From<CreateCategoryRequest> for NewCategory {
    fn from(r: CreateCategoryRequest) -> Self {
        NewCategory {
            name: r.name,
            description: r.description,
            color: r.color,
            icon: r.icon,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
}

impl From<UpdateCategoryRequest> for CategoryPatch {
    fn from(r: UpdateCategoryRequest) -> Self {
        CategoryPatch {
            name: r.name,
            description: r.description,
            color: r.color,
            icon: r.icon,
        }
    }
}

/// Present-but-null becomes `Some(None)`; `#[serde(default)]` covers the absent case.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub stock_status: Option<String>,
    pub include_inactive: Option<bool>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListQuery {
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
    pub product_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates.
///
/// A bare date is widened to the start of the day for `start_date` and to
/// its last instant for `end_date`.
pub fn parse_date_bound(field: &'static str, raw: Option<&str>, end_of_day: bool) -> DomainResult<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| DomainError::invalid_field(field, format!("{field} must be a date (YYYY-MM-DD) or RFC 3339 timestamp")))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    Ok(time.map(|t| date.and_time(t).and_utc()))
}

// -------------------------
// Response DTOs
// -------------------------

/// Product plus the attributes derived from its stored fields.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryBrief>,
    pub stock_status: &'static str,
    pub stock_status_text: &'static str,
    pub profit_margin: Decimal,
    pub total_value: Decimal,
}

impl ProductResponse {
    pub fn new(product: Product, category: Option<CategoryBrief>) -> DomainResult<Self> {
        let status = product.stock_status();
        Ok(Self {
            stock_status: status.as_str(),
            stock_status_text: status.label(),
            profit_margin: product.profit_margin(),
            total_value: product.total_value()?,
            category,
            product,
        })
    }

    /// Without category details.
    pub fn bare(product: Product) -> DomainResult<Self> {
        Self::new(product, None)
    }

    /// Attach categories from a lookup table (listing pages).
    pub fn with_lookup(product: Product, categories: &HashMap<CategoryId, CategoryBrief>) -> DomainResult<Self> {
        let category = product.category_id.and_then(|id| categories.get(&id).cloned());
        Self::new(product, category)
    }
}

/// Ledger row plus the display label of its type.
#[derive(Debug, Serialize)]
pub struct MovementResponse {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub type_text: &'static str,
}

impl From<StockMovement> for MovementResponse {
    fn from(movement: StockMovement) -> Self {
        Self {
            type_text: movement.movement_type.label(),
            movement,
        }
    }
}

pub fn movements(rows: Vec<StockMovement>) -> Vec<MovementResponse> {
    rows.into_iter().map(MovementResponse::from).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBrief {
    pub id: CategoryId,
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
}

impl From<&Category> for CategoryBrief {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            color: c.color.clone(),
            icon: c.icon.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub stock_movements: Vec<MovementResponse>,
}

#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<ProductResponse>,
}

/// Mutation result for a stock change: the product and the ledger row it produced.
#[derive(Debug, Serialize)]
pub struct StockUpdateResponse {
    pub product: ProductResponse,
    pub movement: Option<MovementResponse>,
}

// -------------------------
// Success envelope
// -------------------------

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> From<&Page<T>> for Pagination {
    fn from(p: &Page<T>) -> Self {
        Self {
            current_page: p.page,
            last_page: p.last_page(),
            per_page: p.per_page,
            total: p.total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

pub fn ok<T: Serialize>(data: T, message: &'static str) -> Response {
    respond(StatusCode::OK, Some(data), None, message)
}

pub fn created<T: Serialize>(data: T, message: &'static str) -> Response {
    respond(StatusCode::CREATED, Some(data), None, message)
}

pub fn paginated<T: Serialize>(page: Page<T>, message: &'static str) -> Response {
    let pagination = Pagination::from(&page);
    respond(StatusCode::OK, Some(page.items), Some(pagination), message)
}

/// Success without a body (deletes).
pub fn done(message: &'static str) -> Response {
    respond::<()>(StatusCode::OK, None, None, message)
}

fn respond<T: Serialize>(
    status: StatusCode,
    data: Option<T>,
    pagination: Option<Pagination>,
    message: &'static str,
) -> Response {
    (
        status,
        axum::Json(Envelope {
            success: true,
            data,
            pagination,
            message: Some(message),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn update_distinguishes_null_from_absent() {
        let req: UpdateProductRequest =
            serde_json::from_value(serde_json::json!({"description": null, "name": "Nuevo"})).unwrap();
        assert_eq!(req.description, Some(None));
        assert_eq!(req.location, None);
        assert_eq!(req.name.as_deref(), Some("Nuevo"));
    }

    #[test]
    fn create_defaults_stock_fields() {
        let req: CreateProductRequest =
            serde_json::from_value(serde_json::json!({"sku": "A-1", "name": "Tornillo", "price": 1.5})).unwrap();
        let new = NewProduct::from(req);
        assert_eq!(new.stock_quantity, 0);
        assert_eq!(new.minimum_stock, DEFAULT_MINIMUM_STOCK);
        assert_eq!(new.price, Decimal::new(15, 1));
    }

    #[test]
    fn request_validation_reports_fields() {
        let req: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "sku": "", "name": "Tornillo", "price": 1, "stock_quantity": -1
        }))
        .unwrap();
        let errors = crate::app::errors::field_errors(&req.validate().unwrap_err());
        assert!(errors.contains("sku"));
        assert!(errors.contains("stock_quantity"));
        assert!(!errors.contains("name"));
    }

    #[test]
    fn adjustment_accepts_wire_type_names() {
        let req: StockAdjustmentRequest =
            serde_json::from_value(serde_json::json!({"quantity": 3, "type": "salida"})).unwrap();
        assert_eq!(req.movement_type, MovementType::Outbound);
    }

    #[test]
    fn date_bounds_widen_plain_dates() {
        let start = parse_date_bound("start_date", Some("2024-03-01"), false).unwrap().unwrap();
        assert_eq!((start.day(), start.hour()), (1, 0));
        let end = parse_date_bound("end_date", Some("2024-03-01"), true).unwrap().unwrap();
        assert_eq!((end.hour(), end.minute()), (23, 59));
        assert!(parse_date_bound("start_date", Some("yesterday"), false).is_err());
        assert_eq!(parse_date_bound("start_date", Some("  "), false).unwrap(), None);
    }

    #[test]
    fn response_carries_derived_fields() {
        let new = NewProduct::new("SKU-9", "Martillo", Decimal::new(2000, 2))
            .with_stock(3, 5)
            .with_cost_price(Decimal::new(1000, 2));
        let product = Product::register(new, stockroom_core::UserId::new(), Utc::now()).unwrap().product;
        let json = serde_json::to_value(ProductResponse::bare(product).unwrap()).unwrap();
        assert_eq!(json["stock_status"], "low_stock");
        assert_eq!(json["stock_status_text"], "Stock Bajo");
        assert_eq!(json["sku"], "SKU-9");
        assert!(json.get("category").is_none());
        assert_eq!(json["total_value"], 60.0);
    }

    #[test]
    fn out_of_range_value_is_an_error_not_a_panic() {
        let new = NewProduct::new("SKU-X", "Lingote", Decimal::new(1, 0));
        let mut product = Product::register(new, stockroom_core::UserId::new(), Utc::now()).unwrap().product;
        product.stock_quantity = i64::MAX;
        product.price = Decimal::MAX;
        assert!(ProductResponse::bare(product).is_err());
    }

    #[test]
    fn movement_response_labels_its_type() {
        let new = NewProduct::new("SKU-M", "Clavo", Decimal::new(50, 2)).with_stock(8, 2);
        let movement = Product::register(new, stockroom_core::UserId::new(), Utc::now())
            .unwrap()
            .movement
            .unwrap();
        let json = serde_json::to_value(MovementResponse::from(movement)).unwrap();
        assert_eq!(json["type"], "entrada");
        assert_eq!(json["type_text"], "Entrada");
        assert_eq!(json["new_quantity"], 8);
    }
}
