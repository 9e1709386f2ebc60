//! Ledger entries and the stock adjustment request that produces them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, FieldErrors, MovementId, ProductId, UserId};

use crate::product::Product;
use crate::stock::{MovementType, StockChange};

pub const MAX_REASON_LEN: usize = 255;
pub const MAX_REFERENCE_LEN: usize = 100;

/// A single append-only ledger entry.
///
/// `quantity_change` is always the signed delta `new_quantity - previous_quantity`,
/// whatever the movement type. `product_sku` and `product_name` are copied from
/// the product when the entry is written, so the entry stays readable after the
/// product is soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub product_sku: String,
    pub product_name: String,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity_change: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub movement_date: DateTime<Utc>,
}

impl StockMovement {
    /// Build the ledger entry for `change` applied to `product`.
    pub fn record(
        product: &Product,
        change: StockChange,
        movement_type: MovementType,
        reason: Option<String>,
        reference: Option<String>,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            product_id: product.id,
            product_sku: product.sku.clone(),
            product_name: product.name.clone(),
            user_id: actor,
            movement_type,
            quantity_change: change.delta(),
            previous_quantity: change.previous,
            new_quantity: change.new,
            reason,
            reference,
            movement_date: at,
        }
    }

    /// Snapshots reconcile with the recorded delta.
    pub fn is_consistent(&self) -> bool {
        self.new_quantity - self.previous_quantity == self.quantity_change
            && self.new_quantity >= 0
            && self.previous_quantity >= 0
    }
}

/// Explicit stock adjustment request (`POST /products/:id/stock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference: Option<String>,
}

impl StockAdjustment {
    pub fn new(movement_type: MovementType, quantity: i64) -> Self {
        Self {
            movement_type,
            quantity,
            reason: None,
            reference: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        if let Err(DomainError::Validation(fields)) =
            self.movement_type.validate_quantity(self.quantity)
        {
            errors.merge(fields);
        }
        if self.reason.as_deref().is_some_and(|r| r.chars().count() > MAX_REASON_LEN) {
            errors.add("reason", format!("reason may not exceed {MAX_REASON_LEN} characters"));
        }
        if self
            .reference
            .as_deref()
            .is_some_and(|r| r.chars().count() > MAX_REFERENCE_LEN)
        {
            errors.add(
                "reference",
                format!("reference may not exceed {MAX_REFERENCE_LEN} characters"),
            );
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::NewProduct;
    use rust_decimal::Decimal;

    fn product() -> Product {
        let new = NewProduct::new("SKU-001", "Widget", Decimal::new(1000, 2));
        Product::register(new, UserId::new(), Utc::now()).unwrap().product
    }

    #[test]
    fn record_snapshots_product_identity() {
        let p = product();
        let change = StockChange { previous: 10, new: 7 };
        let actor = UserId::new();
        let m = StockMovement::record(
            &p,
            change,
            MovementType::Outbound,
            Some("venta mostrador".into()),
            None,
            actor,
            Utc::now(),
        );

        assert_eq!(m.product_id, p.id);
        assert_eq!(m.product_sku, "SKU-001");
        assert_eq!(m.product_name, "Widget");
        assert_eq!(m.user_id, actor);
        assert_eq!(m.quantity_change, -3);
        assert!(m.is_consistent());
    }

    #[test]
    fn adjustment_validation_collects_every_field() {
        let mut adj = StockAdjustment::new(MovementType::Outbound, 0).with_reason("x".repeat(MAX_REASON_LEN + 1));
        adj.reference = Some("r".repeat(MAX_REFERENCE_LEN + 1));

        let Err(DomainError::Validation(fields)) = adj.validate() else {
            panic!("expected validation error");
        };
        assert!(fields.contains("quantity"));
        assert!(fields.contains("reason"));
        assert!(fields.contains("reference"));
    }

    #[test]
    fn movement_serializes_type_with_wire_name() {
        let p = product();
        let m = StockMovement::record(
            &p,
            StockChange { previous: 7, new: 4 },
            MovementType::Adjustment,
            None,
            None,
            UserId::new(),
            Utc::now(),
        );
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "ajuste");
        assert_eq!(json["quantity_change"], -3);
    }
}
