//! Inventory domain module.
//!
//! Business rules for the product registry and the stock-movement ledger,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).
//! Storage adapters call into these functions inside their transaction and
//! persist whatever they return.

pub mod category;
pub mod movement;
pub mod product;
pub mod stock;

pub use category::{Category, CategoryPatch, NewCategory, DEFAULT_CATEGORY_COLOR};
pub use movement::{StockAdjustment, StockMovement};
pub use product::{
    DEFAULT_MINIMUM_STOCK, DEFAULT_UNIT, MAX_PRICE, MAX_WEIGHT, NewProduct, Product, ProductMutation,
    ProductPatch,
};
pub use stock::{Effect, MovementType, StockChange, StockStatus, MAX_STOCK_QUANTITY};
