//! Infrastructure layer: storage adapters and process configuration.

pub mod config;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use store::{
    CATEGORY_PRODUCTS_LIMIT, DateRange, InMemoryInventoryStore, InventoryStore, MovementFilter, PRODUCT_MOVEMENTS_LIMIT,
    Page, PageRequest, PostgresInventoryStore, ProductFilter, ProductSortField, SortDirection,
};
