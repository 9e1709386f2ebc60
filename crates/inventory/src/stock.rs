//! Stock quantity rules: movement types, the quantity arithmetic behind every
//! ledger entry, and the derived stock classification.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult};

/// Kind of stock movement recorded in the ledger.
///
/// The wire names (`entrada`, `salida`, ...) are what the dashboard sends and
/// what the `stock_movements.type` column stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    #[serde(rename = "entrada")]
    Inbound,
    #[serde(rename = "salida")]
    Outbound,
    #[serde(rename = "ajuste")]
    Adjustment,
    #[serde(rename = "venta")]
    Sale,
    #[serde(rename = "compra")]
    Purchase,
}

/// How a movement type turns a requested quantity into a new on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Increase,
    Decrease,
    /// Absolute count.
    Set,
}

impl MovementType {
    pub const ALL: [MovementType; 5] = [
        MovementType::Inbound,
        MovementType::Outbound,
        MovementType::Adjustment,
        MovementType::Sale,
        MovementType::Purchase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Inbound => "entrada",
            MovementType::Outbound => "salida",
            MovementType::Adjustment => "ajuste",
            MovementType::Sale => "venta",
            MovementType::Purchase => "compra",
        }
    }

    /// Display label, served as `type_text`.
    pub fn label(self) -> &'static str {
        match self {
            MovementType::Inbound => "Entrada",
            MovementType::Outbound => "Salida",
            MovementType::Adjustment => "Ajuste",
            MovementType::Sale => "Venta",
            MovementType::Purchase => "Compra",
        }
    }

    pub fn effect(self) -> Effect {
        match self {
            MovementType::Inbound | MovementType::Purchase => Effect::Increase,
            MovementType::Outbound | MovementType::Sale => Effect::Decrease,
            MovementType::Adjustment => Effect::Set,
        }
    }

    /// True for types that take stock out of the warehouse.
    pub fn is_outbound(self) -> bool {
        self.effect() == Effect::Decrease
    }

    /// Type recorded when a manual edit changes the quantity by `delta`.
    pub fn for_edit_delta(delta: i64) -> Self {
        if delta > 0 {
            MovementType::Inbound
        } else {
            MovementType::Outbound
        }
    }

    /// Check that `quantity` is acceptable for this type.
    ///
    /// Relative movements need a strictly positive magnitude; an absolute
    /// count only needs to be non-negative.
    pub fn validate_quantity(self, quantity: i64) -> DomainResult<()> {
        match self.effect() {
            Effect::Increase | Effect::Decrease if quantity <= 0 => Err(DomainError::invalid_field(
                "quantity",
                "quantity must be greater than zero",
            )),
            Effect::Set if quantity < 0 => Err(DomainError::invalid_field(
                "quantity",
                "quantity cannot be negative",
            )),
            _ => Ok(()),
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                DomainError::invalid_field(
                    "type",
                    "type must be one of: entrada, salida, ajuste, venta, compra",
                )
            })
    }
}

/// Upper bound on units held for one product.
pub const MAX_STOCK_QUANTITY: i64 = 1_000_000_000_000;

/// Before/after snapshot of a single stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub previous: i64,
    pub new: i64,
}

impl StockChange {
    /// Signed delta, the value stored as `quantity_change` for every type.
    pub fn delta(&self) -> i64 {
        self.new - self.previous
    }

    /// Compute the outcome of applying `quantity` of `kind` to `previous` units.
    ///
    /// Fails with `InsufficientStock` when an outbound movement asks for more
    /// than is on hand; the result is never negative.
    pub fn plan(previous: i64, quantity: i64, kind: MovementType) -> DomainResult<Self> {
        kind.validate_quantity(quantity)?;

        let new = match kind.effect() {
            Effect::Increase => previous
                .checked_add(quantity)
                .filter(|n| *n <= MAX_STOCK_QUANTITY)
                .ok_or_else(|| {
                    DomainError::invalid_field(
                        "quantity",
                        format!("stock on hand may not exceed {MAX_STOCK_QUANTITY}"),
                    )
                })?,
            Effect::Decrease => {
                if quantity > previous {
                    return Err(DomainError::InsufficientStock {
                        available: previous,
                        requested: quantity,
                    });
                }
                previous - quantity
            }
            Effect::Set if quantity > MAX_STOCK_QUANTITY => {
                return Err(DomainError::invalid_field(
                    "quantity",
                    format!("stock on hand may not exceed {MAX_STOCK_QUANTITY}"),
                ));
            }
            Effect::Set => quantity,
        };

        Ok(Self { previous, new })
    }
}

/// Tri-state stock classification derived from quantity and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    /// Classify an on-hand quantity against its minimum.
    pub fn classify(stock_quantity: i64, minimum_stock: i64) -> Self {
        if stock_quantity <= 0 {
            StockStatus::OutOfStock
        } else if stock_quantity <= minimum_stock {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "out_of_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::InStock => "in_stock",
        }
    }

    /// Display label, served as `type_text`.
    pub fn label(self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Agotado",
            StockStatus::LowStock => "Stock Bajo",
            StockStatus::InStock => "Disponible",
        }
    }

    /// Parse the short filter form used by listings (`in`, `low`, `out`).
    pub fn from_filter(s: &str) -> Option<Self> {
        match s {
            "in" | "in_stock" => Some(StockStatus::InStock),
            "low" | "low_stock" => Some(StockStatus::LowStock),
            "out" | "out_of_stock" => Some(StockStatus::OutOfStock),
            _ => None,
        }
    }
}
