//! Product registry entity: stored fields, derived values and the
//! transitions (register / edit / adjust stock / soft-delete).
//!
//! Transitions are pure: they take the current state and return the next
//! state plus the ledger entry to append, if any. The caller persists both in
//! one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, FieldErrors, ProductId, UserId};

use crate::movement::{StockAdjustment, StockMovement};
use crate::stock::{MovementType, StockChange, StockStatus, MAX_STOCK_QUANTITY};

pub const DEFAULT_UNIT: &str = "unidad";
pub const DEFAULT_MINIMUM_STOCK: i64 = 5;

/// Largest storable price or cost: ten integer digits, two decimals.
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);
/// Largest storable weight: seven integer digits, three decimals.
pub const MAX_WEIGHT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 3);

const INITIAL_STOCK_REASON: &str = "Stock inicial del producto";
const EDIT_STOCK_REASON: &str = "Actualización manual de stock";
const ADJUST_STOCK_REASON: &str = "Ajuste manual de stock";

/// Product as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub stock_quantity: i64,
    pub minimum_stock: i64,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub barcode: Option<String>,
    pub unit: String,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Next product state plus the ledger entry the transition produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMutation {
    pub product: Product,
    pub movement: Option<StockMovement>,
}

impl Product {
    pub fn stock_status(&self) -> StockStatus {
        StockStatus::classify(self.stock_quantity, self.minimum_stock)
    }

    /// `(price - cost) / cost * 100`, or zero when there is no positive cost.
    pub fn profit_margin(&self) -> Decimal {
        match self.cost_price {
            Some(cost) if cost > Decimal::ZERO => {
                (self.price - cost) / cost * Decimal::ONE_HUNDRED
            }
            _ => Decimal::ZERO,
        }
    }

    /// Stock on hand valued at the sale price.
    pub fn total_value(&self) -> DomainResult<Decimal> {
        Decimal::from(self.stock_quantity)
            .checked_mul(self.price)
            .ok_or_else(|| DomainError::invalid_field("total_value", "inventory value is out of range"))
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Create a product. Initial stock goes through the ledger as one
    /// `entrada` from zero, so the ledger always starts at quantity 0.
    pub fn register(new: NewProduct, actor: UserId, now: DateTime<Utc>) -> DomainResult<ProductMutation> {
        new.validate()?;

        let initial_stock = new.stock_quantity;
        let product = Product {
            id: ProductId::new(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            category_id: new.category_id,
            stock_quantity: 0,
            minimum_stock: new.minimum_stock,
            price: new.price,
            cost_price: new.cost_price,
            location: new.location,
            image_url: new.image_url,
            barcode: new.barcode,
            unit: new.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            weight: new.weight,
            dimensions: new.dimensions,
            is_active: new.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        if initial_stock == 0 {
            return Ok(ProductMutation { product, movement: None });
        }

        product.apply_change(
            MovementType::Inbound,
            initial_stock,
            Some(INITIAL_STOCK_REASON.to_string()),
            None,
            actor,
            now,
        )
    }

    /// Apply an explicit stock adjustment.
    pub fn adjust_stock(
        &self,
        adjustment: StockAdjustment,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<ProductMutation> {
        self.ensure_live()?;
        adjustment.validate()?;

        self.apply_change(
            adjustment.movement_type,
            adjustment.quantity,
            Some(adjustment.reason.unwrap_or_else(|| ADJUST_STOCK_REASON.to_string())),
            adjustment.reference,
            actor,
            now,
        )
    }

    /// Apply a partial edit. A changed `stock_quantity` is routed through the
    /// ledger as `entrada` (increase) or `salida` (decrease); other fields never
    /// touch it.
    pub fn edit(&self, patch: ProductPatch, actor: UserId, now: DateTime<Utc>) -> DomainResult<ProductMutation> {
        self.ensure_live()?;
        patch.validate()?;

        let mut next = self.clone();
        if let Some(sku) = patch.sku {
            next.sku = sku.trim().to_string();
        }
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(category_id) = patch.category_id {
            next.category_id = category_id;
        }
        if let Some(minimum_stock) = patch.minimum_stock {
            next.minimum_stock = minimum_stock;
        }
        if let Some(price) = patch.price {
            next.price = price;
        }
        if let Some(cost_price) = patch.cost_price {
            next.cost_price = cost_price;
        }
        if let Some(location) = patch.location {
            next.location = location;
        }
        if let Some(image_url) = patch.image_url {
            next.image_url = image_url;
        }
        if let Some(barcode) = patch.barcode {
            next.barcode = barcode;
        }
        if let Some(unit) = patch.unit {
            next.unit = unit;
        }
        if let Some(weight) = patch.weight {
            next.weight = weight;
        }
        if let Some(dimensions) = patch.dimensions {
            next.dimensions = dimensions;
        }
        if let Some(is_active) = patch.is_active {
            next.is_active = is_active;
        }
        next.updated_at = now;

        let delta = match patch.stock_quantity {
            Some(target) => target - self.stock_quantity,
            None => 0,
        };
        if delta == 0 {
            return Ok(ProductMutation { product: next, movement: None });
        }

        next.apply_change(
            MovementType::for_edit_delta(delta),
            delta.abs(),
            Some(patch.reason.unwrap_or_else(|| EDIT_STOCK_REASON.to_string())),
            None,
            actor,
            now,
        )
    }

    /// Tombstone the product. Its ledger entries stay where they are.
    pub fn soft_delete(&self, now: DateTime<Utc>) -> DomainResult<Product> {
        self.ensure_live()?;
        let mut next = self.clone();
        next.deleted_at = Some(now);
        next.updated_at = now;
        Ok(next)
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if self.is_deleted() {
            return Err(DomainError::not_found("product"));
        }
        Ok(())
    }

    fn apply_change(
        &self,
        movement_type: MovementType,
        quantity: i64,
        reason: Option<String>,
        reference: Option<String>,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<ProductMutation> {
        let change = StockChange::plan(self.stock_quantity, quantity, movement_type)?;

        let mut next = self.clone();
        next.stock_quantity = change.new;
        next.updated_at = now;

        let movement = StockMovement::record(&next, change, movement_type, reason, reference, actor, now);
        Ok(ProductMutation { product: next, movement: Some(movement) })
    }
}

/// Input for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub stock_quantity: i64,
    pub minimum_stock: i64,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub barcode: Option<String>,
    pub unit: Option<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub is_active: Option<bool>,
}

impl NewProduct {
    /// Minimal product with no stock and the default minimum.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            description: None,
            category_id: None,
            stock_quantity: 0,
            minimum_stock: DEFAULT_MINIMUM_STOCK,
            price,
            cost_price: None,
            location: None,
            image_url: None,
            barcode: None,
            unit: None,
            weight: None,
            dimensions: None,
            is_active: None,
        }
    }

    pub fn with_stock(mut self, stock_quantity: i64, minimum_stock: i64) -> Self {
        self.stock_quantity = stock_quantity;
        self.minimum_stock = minimum_stock;
        self
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_cost_price(mut self, cost_price: Decimal) -> Self {
        self.cost_price = Some(cost_price);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        rules::sku(&mut errors, &self.sku);
        rules::name(&mut errors, &self.name);
        rules::quantity(&mut errors, "stock_quantity", self.stock_quantity);
        rules::quantity(&mut errors, "minimum_stock", self.minimum_stock);
        rules::money(&mut errors, "price", Some(self.price));
        rules::money(&mut errors, "cost_price", self.cost_price);
        rules::weight(&mut errors, self.weight);
        rules::max_len(&mut errors, "location", self.location.as_deref(), 100);
        rules::max_len(&mut errors, "image_url", self.image_url.as_deref(), 255);
        rules::max_len(&mut errors, "barcode", self.barcode.as_deref(), 100);
        rules::max_len(&mut errors, "dimensions", self.dimensions.as_deref(), 100);
        if let Some(unit) = self.unit.as_deref() {
            rules::unit(&mut errors, unit);
        }
        errors.into_result()
    }
}

/// Partial product edit. `None` leaves a field untouched; for nullable fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<CategoryId>>,
    pub stock_quantity: Option<i64>,
    pub minimum_stock: Option<i64>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Option<Decimal>>,
    pub location: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub barcode: Option<Option<String>>,
    pub unit: Option<String>,
    pub weight: Option<Option<Decimal>>,
    pub dimensions: Option<Option<String>>,
    pub is_active: Option<bool>,
    /// Ledger reason used when `stock_quantity` changes.
    pub reason: Option<String>,
}

impl ProductPatch {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        if let Some(sku) = self.sku.as_deref() {
            rules::sku(&mut errors, sku);
        }
        if let Some(name) = self.name.as_deref() {
            rules::name(&mut errors, name);
        }
        if let Some(q) = self.stock_quantity {
            rules::quantity(&mut errors, "stock_quantity", q);
        }
        if let Some(m) = self.minimum_stock {
            rules::quantity(&mut errors, "minimum_stock", m);
        }
        rules::money(&mut errors, "price", self.price);
        rules::money(&mut errors, "cost_price", self.cost_price.flatten());
        rules::weight(&mut errors, self.weight.flatten());
        rules::max_len(&mut errors, "location", self.location.clone().flatten().as_deref(), 100);
        rules::max_len(&mut errors, "image_url", self.image_url.clone().flatten().as_deref(), 255);
        rules::max_len(&mut errors, "barcode", self.barcode.clone().flatten().as_deref(), 100);
        rules::max_len(&mut errors, "dimensions", self.dimensions.clone().flatten().as_deref(), 100);
        rules::max_len(&mut errors, "reason", self.reason.as_deref(), 255);
        if let Some(unit) = self.unit.as_deref() {
            rules::unit(&mut errors, unit);
        }
        errors.into_result()
    }

    /// Category the edit points the product at, if it sets one.
    pub fn target_category(&self) -> Option<CategoryId> {
        self.category_id.flatten()
    }
}

mod rules {
    use rust_decimal::Decimal;
    use stockroom_core::FieldErrors;

    use super::{MAX_PRICE, MAX_STOCK_QUANTITY, MAX_WEIGHT};

    pub fn sku(errors: &mut FieldErrors, sku: &str) {
        if sku.trim().is_empty() {
            errors.add("sku", "sku is required");
        } else if sku.trim().chars().count() > 100 {
            errors.add("sku", "sku may not exceed 100 characters");
        }
    }

    pub fn name(errors: &mut FieldErrors, name: &str) {
        if name.trim().is_empty() {
            errors.add("name", "name is required");
        } else if name.trim().chars().count() > 255 {
            errors.add("name", "name may not exceed 255 characters");
        }
    }

    pub fn unit(errors: &mut FieldErrors, unit: &str) {
        if unit.trim().is_empty() {
            errors.add("unit", "unit cannot be blank");
        } else {
            max_len(errors, "unit", Some(unit), 50);
        }
    }

    pub fn quantity(errors: &mut FieldErrors, field: &str, value: i64) {
        if value < 0 {
            errors.add(field, format!("{field} cannot be negative"));
        } else if value > MAX_STOCK_QUANTITY {
            errors.add(field, format!("{field} may not exceed {MAX_STOCK_QUANTITY}"));
        }
    }

    pub fn money(errors: &mut FieldErrors, field: &str, value: Option<Decimal>) {
        decimal(errors, field, value, MAX_PRICE);
    }

    pub fn weight(errors: &mut FieldErrors, value: Option<Decimal>) {
        decimal(errors, "weight", value, MAX_WEIGHT);
    }

    /// Non-negative, at most `max`, and no finer than `max`'s scale.
    fn decimal(errors: &mut FieldErrors, field: &str, value: Option<Decimal>, max: Decimal) {
        let Some(v) = value else { return };
        if v.is_sign_negative() && !v.is_zero() {
            errors.add(field, format!("{field} cannot be negative"));
        } else if v > max {
            errors.add(field, format!("{field} may not exceed {max}"));
        } else if v.normalize().scale() > max.scale() {
            errors.add(field, format!("{field} may have at most {} decimal places", max.scale()));
        }
    }

    pub fn max_len(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
        if value.is_some_and(|v| v.chars().count() > max) {
            errors.add(field, format!("{field} may not exceed {max} characters"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn registered(stock: i64, minimum: i64) -> Product {
        let new = NewProduct::new("SKU-001", "Widget", price(1000)).with_stock(stock, minimum);
        Product::register(new, UserId::new(), Utc::now()).unwrap().product
    }

    #[test]
    fn register_without_stock_writes_no_ledger_entry() {
        let new = NewProduct::new("SKU-001", "Widget", price(1000));
        let out = Product::register(new, UserId::new(), Utc::now()).unwrap();

        assert_eq!(out.product.stock_quantity, 0);
        assert!(out.movement.is_none());
        assert_eq!(out.product.unit, DEFAULT_UNIT);
        assert!(out.product.is_active);
    }

    #[test]
    fn register_with_stock_writes_one_inbound_entry_from_zero() {
        let actor = UserId::new();
        let new = NewProduct::new("SKU-001", "Widget", price(1000)).with_stock(15, 5);
        let out = Product::register(new, actor, Utc::now()).unwrap();

        assert_eq!(out.product.stock_quantity, 15);
        let m = out.movement.expect("initial stock movement");
        assert_eq!(m.movement_type, MovementType::Inbound);
        assert_eq!((m.previous_quantity, m.new_quantity, m.quantity_change), (0, 15, 15));
        assert_eq!(m.user_id, actor);
        assert_eq!(m.product_id, out.product.id);
        assert_eq!(m.reason.as_deref(), Some(INITIAL_STOCK_REASON));
    }

    #[test]
    fn register_rejects_invalid_input_with_field_map() {
        let mut new = NewProduct::new("  ", "", price(-100)).with_stock(-1, -1);
        new.location = Some("x".repeat(101));

        let Err(DomainError::Validation(fields)) = Product::register(new, UserId::new(), Utc::now()) else {
            panic!("expected validation error");
        };
        for field in ["sku", "name", "price", "stock_quantity", "minimum_stock", "location"] {
            assert!(fields.contains(field), "missing {field}");
        }
    }

    #[test]
    fn outbound_adjustment_scenario() {
        let p = registered(10, 5);
        let out = p
            .adjust_stock(StockAdjustment::new(MovementType::Outbound, 3), UserId::new(), Utc::now())
            .unwrap();

        assert_eq!(out.product.stock_quantity, 7);
        assert_eq!(out.product.stock_status(), StockStatus::InStock);
        let m = out.movement.unwrap();
        assert_eq!((m.previous_quantity, m.new_quantity, m.quantity_change), (10, 7, -3));
    }

    #[test]
    fn oversized_outbound_leaves_product_untouched() {
        let p = registered(10, 5);
        let before = p.clone();
        let err = p
            .adjust_stock(StockAdjustment::new(MovementType::Outbound, 20), UserId::new(), Utc::now())
            .unwrap_err();

        assert!(matches!(err, DomainError::InsufficientStock { available: 10, requested: 20 }));
        assert_eq!(p, before);
    }

    #[test]
    fn adjustment_to_absolute_count() {
        let p = registered(7, 5);
        let out = p
            .adjust_stock(
                StockAdjustment::new(MovementType::Adjustment, 4).with_reason("conteo fisico"),
                UserId::new(),
                Utc::now(),
            )
            .unwrap();

        let m = out.movement.unwrap();
        assert_eq!(m.movement_type, MovementType::Adjustment);
        assert_eq!((m.previous_quantity, m.new_quantity, m.quantity_change), (7, 4, -3));
        assert_eq!(m.reason.as_deref(), Some("conteo fisico"));
        assert_eq!(out.product.stock_status(), StockStatus::LowStock);
    }

    #[test]
    fn edit_increasing_stock_records_inbound() {
        let p = registered(10, 5);
        let patch = ProductPatch {
            stock_quantity: Some(12),
            reason: Some("recount".into()),
            ..ProductPatch::default()
        };
        let out = p.edit(patch, UserId::new(), Utc::now()).unwrap();

        let m = out.movement.unwrap();
        assert_eq!(m.movement_type, MovementType::Inbound);
        assert_eq!((m.previous_quantity, m.new_quantity, m.quantity_change), (10, 12, 2));
        assert_eq!(m.reason.as_deref(), Some("recount"));
    }

    #[test]
    fn edit_decreasing_stock_records_outbound_with_default_reason() {
        let p = registered(10, 5);
        let patch = ProductPatch { stock_quantity: Some(6), ..ProductPatch::default() };
        let out = p.edit(patch, UserId::new(), Utc::now()).unwrap();

        let m = out.movement.unwrap();
        assert_eq!(m.movement_type, MovementType::Outbound);
        assert_eq!(m.quantity_change, -4);
        assert_eq!(m.reason.as_deref(), Some(EDIT_STOCK_REASON));
    }

    #[test]
    fn edit_of_other_fields_does_not_touch_ledger() {
        let p = registered(10, 5);
        let patch = ProductPatch {
            name: Some("Widget XL".into()),
            price: Some(price(2500)),
            stock_quantity: Some(10),
            cost_price: Some(None),
            ..ProductPatch::default()
        };
        let out = p.edit(patch, UserId::new(), Utc::now()).unwrap();

        assert!(out.movement.is_none());
        assert_eq!(out.product.name, "Widget XL");
        assert_eq!(out.product.price, price(2500));
        assert_eq!(out.product.stock_quantity, 10);
    }

    #[test]
    fn edit_snapshot_uses_edited_identity() {
        let p = registered(10, 5);
        let patch = ProductPatch {
            sku: Some("SKU-002".into()),
            stock_quantity: Some(1),
            ..ProductPatch::default()
        };
        let m = p.edit(patch, UserId::new(), Utc::now()).unwrap().movement.unwrap();
        assert_eq!(m.product_sku, "SKU-002");
    }

    #[test]
    fn soft_deleted_product_rejects_further_transitions() {
        let p = registered(10, 5);
        let deleted = p.soft_delete(Utc::now()).unwrap();
        assert!(deleted.is_deleted());

        assert_eq!(deleted.soft_delete(Utc::now()).unwrap_err(), DomainError::not_found("product"));
        assert!(matches!(
            deleted.adjust_stock(StockAdjustment::new(MovementType::Inbound, 1), UserId::new(), Utc::now()),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn profit_margin_is_zero_without_positive_cost() {
        let mut p = registered(1, 0);
        assert_eq!(p.profit_margin(), Decimal::ZERO);

        p.cost_price = Some(Decimal::ZERO);
        assert_eq!(p.profit_margin(), Decimal::ZERO);

        p.cost_price = Some(price(800));
        p.price = price(1000);
        assert_eq!(p.profit_margin(), Decimal::new(25, 0));
    }

    #[test]
    fn total_value_is_quantity_times_price() {
        let p = registered(3, 0);
        assert_eq!(p.total_value().unwrap(), price(3000));
    }

    #[test]
    fn numeric_bounds_follow_the_storage_columns() {
        assert_eq!(MAX_PRICE, Decimal::new(999_999_999_999, 2));
        assert_eq!(MAX_WEIGHT, Decimal::new(9_999_999_999, 3));

        let ok = NewProduct::new("SKU-MAX", "Widget", MAX_PRICE).with_stock(MAX_STOCK_QUANTITY, 0);
        assert!(ok.validate().is_ok());

        let mut huge = NewProduct::new("SKU-BIG", "Widget", Decimal::new(10_000_000_000, 0))
            .with_stock(i64::MAX, 0);
        huge.cost_price = Some(Decimal::new(12345, 3));
        huge.weight = Some(Decimal::new(10_000_000, 0));
        let Err(DomainError::Validation(errors)) = huge.validate() else {
            panic!("oversized values must fail validation");
        };
        for field in ["price", "stock_quantity", "cost_price", "weight"] {
            assert!(errors.contains(field), "{field} should be rejected");
        }

        let trailing_zeros = NewProduct::new("SKU-TZ", "Widget", Decimal::new(1_500, 3));
        assert!(trailing_zeros.validate().is_ok());
    }

    #[test]
    fn oversized_patch_values_are_rejected() {
        let patch = ProductPatch {
            price: Some(Decimal::new(1, 3)),
            stock_quantity: Some(MAX_STOCK_QUANTITY + 1),
            ..ProductPatch::default()
        };
        let Err(DomainError::Validation(errors)) = patch.validate() else {
            panic!("expected validation failure");
        };
        assert!(errors.contains("price"));
        assert!(errors.contains("stock_quantity"));
    }

    #[test]
    fn total_value_reports_overflow_instead_of_panicking() {
        let mut p = registered(1, 0);
        p.stock_quantity = i64::MAX;
        p.price = Decimal::MAX;
        assert_eq!(p.total_value().unwrap_err().kind(), "validation_error");
    }

    #[test]
    fn stock_status_is_stable_between_reads() {
        let p = registered(4, 5);
        assert_eq!(p.stock_status(), p.stock_status());
        assert_eq!(p.stock_status(), StockStatus::LowStock);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn movement_type() -> impl Strategy<Value = MovementType> {
            prop::sample::select(MovementType::ALL.to_vec())
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: every ledger entry produced by a sequence of
            /// adjustments is consistent and chains onto the previous one.
            #[test]
            fn ledger_chains_and_reconciles(
                initial in 0i64..500,
                steps in prop::collection::vec((movement_type(), 0i64..300), 1..30)
            ) {
                let new = NewProduct::new("SKU-P", "Prop", Decimal::ONE).with_stock(initial, 5);
                let out = Product::register(new, UserId::new(), Utc::now()).unwrap();
                let mut product = out.product;
                let mut last_new = out.movement.map(|m| m.new_quantity).unwrap_or(0);

                for (kind, quantity) in steps {
                    let before = product.clone();
                    match product.adjust_stock(StockAdjustment::new(kind, quantity), UserId::new(), Utc::now()) {
                        Ok(m) => {
                            let entry = m.movement.unwrap();
                            prop_assert!(entry.is_consistent());
                            prop_assert_eq!(entry.previous_quantity, last_new);
                            prop_assert_eq!(entry.new_quantity, m.product.stock_quantity);
                            last_new = entry.new_quantity;
                            product = m.product;
                        }
                        Err(_) => prop_assert_eq!(&product, &before),
                    }
                    prop_assert!(product.stock_quantity >= 0);
                }
            }

            /// Property: without a positive cost the margin is zero.
            #[test]
            fn margin_zero_without_cost(cents in 0i64..1_000_000, zero_cost in any::<bool>()) {
                let mut new = NewProduct::new("SKU-M", "Margin", Decimal::new(cents, 2));
                if zero_cost {
                    new = new.with_cost_price(Decimal::ZERO);
                }
                let product = Product::register(new, UserId::new(), Utc::now()).unwrap().product;
                prop_assert_eq!(product.profit_margin(), Decimal::ZERO);
            }
        }
    }
}
