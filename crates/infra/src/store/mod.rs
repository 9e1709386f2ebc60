//! Persistence boundary for the registry and the ledger.
//!
//! Every stock-changing method applies the domain transition and appends its
//! ledger entry in one atomic unit: either both are committed or neither is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{CategoryId, DomainResult, MovementId, ProductId, UserId};
use stockroom_inventory::{
    Category, CategoryPatch, NewCategory, NewProduct, Product, ProductMutation, ProductPatch, StockAdjustment,
    StockMovement,
};

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod reports;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use query::{DateRange, MovementFilter, Page, PageRequest, ProductFilter, ProductSortField, SortDirection};
pub use reports::{
    CategorySummary, DashboardStatistics, MovementStatistics, ProductStatistics, StockAlerts, TopProduct, TypeCount,
    ValuePoint,
};

/// Products shown on a category detail view.
pub const CATEGORY_PRODUCTS_LIMIT: usize = 10;
/// Ledger entries shown on a product detail view.
pub const PRODUCT_MOVEMENTS_LIMIT: usize = 20;

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Record an acting user (id from the token, role for display).
    async fn record_user(&self, user_id: UserId, role: &str) -> DomainResult<()>;

    // products

    async fn create_product(&self, new: NewProduct, actor: UserId) -> DomainResult<ProductMutation>;

    /// Live product by id; soft-deleted products are `NotFound`.
    async fn get_product(&self, id: ProductId) -> DomainResult<Product>;

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> DomainResult<Page<Product>>;

    async fn update_product(&self, id: ProductId, patch: ProductPatch, actor: UserId)
    -> DomainResult<ProductMutation>;

    async fn delete_product(&self, id: ProductId) -> DomainResult<Product>;

    async fn adjust_stock(
        &self,
        id: ProductId,
        adjustment: StockAdjustment,
        actor: UserId,
    ) -> DomainResult<ProductMutation>;

    /// Live products with `0 < stock <= minimum`, lowest stock first.
    async fn low_stock_products(&self, page: PageRequest) -> DomainResult<Page<Product>>;

    async fn product_statistics(&self) -> DomainResult<ProductStatistics>;

    // categories

    async fn create_category(&self, new: NewCategory) -> DomainResult<Category>;

    async fn get_category(&self, id: CategoryId) -> DomainResult<Category>;

    /// Latest live, active products of a category.
    async fn category_products(&self, id: CategoryId, limit: usize) -> DomainResult<Vec<Product>>;

    /// All categories by name, with live product counts.
    async fn list_categories(&self, search: Option<&str>) -> DomainResult<Vec<CategorySummary>>;

    async fn update_category(&self, id: CategoryId, patch: CategoryPatch) -> DomainResult<Category>;

    /// Refused with `ReferentialConflict` while a live product references it.
    async fn delete_category(&self, id: CategoryId) -> DomainResult<()>;

    // ledger

    async fn list_movements(&self, filter: &MovementFilter, page: PageRequest) -> DomainResult<Page<StockMovement>>;

    async fn get_movement(&self, id: MovementId) -> DomainResult<StockMovement>;

    /// Newest entries first.
    async fn recent_movements(&self, limit: usize) -> DomainResult<Vec<StockMovement>>;

    async fn product_movements(&self, product_id: ProductId, limit: usize) -> DomainResult<Vec<StockMovement>>;

    async fn movement_statistics(&self, range: DateRange) -> DomainResult<MovementStatistics>;

    // dashboard

    async fn dashboard_statistics(&self, now: DateTime<Utc>) -> DomainResult<DashboardStatistics>;

    async fn stock_alerts(&self, limit: usize) -> DomainResult<StockAlerts>;
}
