use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, Utc};
use rust_decimal::Decimal;

use stockroom_core::{CategoryId, DomainError, DomainResult, MovementId, ProductId, UserId};
use stockroom_inventory::{
    Category, CategoryPatch, Effect, NewCategory, NewProduct, Product, ProductMutation, ProductPatch,
    StockAdjustment, StockMovement, StockStatus,
};

use super::query::{DateRange, MovementFilter, Page, PageRequest, ProductFilter, search_term};
use super::reports::{
    self, CategorySummary, DashboardStatistics, MovementStatistics, ProductStatistics, StockAlerts, TopProduct,
    ValuePoint,
};
use super::InventoryStore;

#[derive(Debug, Default)]
struct Tables {
    /// User id -> role.
    users: HashMap<UserId, String>,
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    /// Append order.
    movements: Vec<StockMovement>,
}

impl Tables {
    fn live_product(&self, id: ProductId) -> DomainResult<&Product> {
        self.products
            .get(&id)
            .filter(|p| !p.is_deleted())
            .ok_or(DomainError::not_found("product"))
    }

    fn live_products(&self) -> impl Iterator<Item = &Product> {
        self.products.values().filter(|p| !p.is_deleted())
    }

    /// Live products counted by statistics and dashboard totals.
    fn counted_products(&self) -> impl Iterator<Item = &Product> {
        self.live_products().filter(|p| p.is_active)
    }

    fn ensure_sku_free(&self, sku: &str, except: Option<ProductId>) -> DomainResult<()> {
        let sku = sku.trim();
        let taken = self.products.values().any(|p| p.sku == sku && Some(p.id) != except);
        if taken {
            return Err(DomainError::invalid_field("sku", "sku has already been taken"));
        }
        Ok(())
    }

    fn ensure_category_exists(&self, id: Option<CategoryId>) -> DomainResult<()> {
        match id {
            Some(id) if !self.categories.contains_key(&id) => {
                Err(DomainError::invalid_field("category_id", "selected category does not exist"))
            }
            _ => Ok(()),
        }
    }

    fn ensure_category_name_free(&self, name: &str, except: Option<CategoryId>) -> DomainResult<()> {
        let name = name.trim();
        let taken = self.categories.values().any(|c| c.name == name && Some(c.id) != except);
        if taken {
            return Err(DomainError::invalid_field("name", "name has already been taken"));
        }
        Ok(())
    }

    /// Apply staged writes in place. Infallible, so a unit either lands whole
    /// or was rejected before any table was touched.
    fn commit(&mut self, staged: Staged) {
        for write in staged.writes {
            match write {
                Write::User { id, role } => {
                    self.users.insert(id, role);
                }
                Write::Actor(id) => {
                    self.users.entry(id).or_insert_with(|| "user".to_string());
                }
                Write::Product(product) => {
                    self.products.insert(product.id, product);
                }
                Write::Movement(movement) => self.movements.push(movement),
                Write::Category(category) => {
                    self.categories.insert(category.id, category);
                }
                Write::RemoveCategory(id) => {
                    self.categories.remove(&id);
                }
            }
        }
    }

    fn live_count(&self, category: CategoryId) -> u64 {
        self.live_products().filter(|p| p.category_id == Some(category)).count() as u64
    }

    fn summaries(&self) -> Vec<CategorySummary> {
        self.categories
            .values()
            .map(|c| CategorySummary {
                category: c.clone(),
                products_count: self.live_count(c.id),
            })
            .collect()
    }

    /// Ledger newest first; entries written in the same instant keep append order reversed.
    fn movements_newest_first(&self) -> Vec<&StockMovement> {
        let mut out: Vec<&StockMovement> = self.movements.iter().rev().collect();
        out.sort_by(|a, b| b.movement_date.cmp(&a.movement_date));
        out
    }

    fn by_status(&self, status: StockStatus) -> Vec<Product> {
        let mut out: Vec<Product> = self.live_products().filter(|p| p.stock_status() == status).cloned().collect();
        out.sort_by(|a, b| a.stock_quantity.cmp(&b.stock_quantity).then_with(|| a.name.cmp(&b.name)));
        out
    }

    fn total_value(&self) -> DomainResult<Decimal> {
        reports::inventory_value(self.counted_products())
    }
}

#[derive(Debug)]
enum Write {
    User { id: UserId, role: String },
    /// Insert with the default role unless the user is already known.
    Actor(UserId),
    Product(Product),
    Movement(StockMovement),
    Category(Category),
    RemoveCategory(CategoryId),
}

/// Rows a mutation wants to write, held back until it has fully succeeded.
#[derive(Debug, Default)]
struct Staged {
    writes: Vec<Write>,
}

impl Staged {
    fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    fn product_mutation(&mut self, actor: UserId, mutation: &ProductMutation) {
        if let Some(movement) = &mutation.movement {
            self.push(Write::Actor(actor));
            self.push(Write::Movement(movement.clone()));
        }
        self.push(Write::Product(mutation.product.clone()));
    }
}

/// In-memory store for dev and tests.
///
/// One lock guards every table. A mutation reads the tables under the write
/// lock, stages the rows it changes and commits them only if the whole unit
/// succeeded.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| DomainError::persistence("lock poisoned"))
    }

    fn mutate<T>(&self, f: impl FnOnce(&Tables, &mut Staged) -> DomainResult<T>) -> DomainResult<T> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| DomainError::persistence("lock poisoned"))?;

        let mut staged = Staged::default();
        let out = f(&guard, &mut staged)?;
        guard.commit(staged);
        Ok(out)
    }
}

fn log_mutation(op: &str, mutation: &ProductMutation) {
    match &mutation.movement {
        Some(m) => tracing::info!(
            operation = op,
            product_id = %m.product_id,
            movement_type = %m.movement_type,
            previous = m.previous_quantity,
            new = m.new_quantity,
            "stock changed"
        ),
        None => tracing::info!(operation = op, product_id = %mutation.product.id, "product saved"),
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn record_user(&self, user_id: UserId, role: &str) -> DomainResult<()> {
        self.mutate(|_, staged| {
            staged.push(Write::User { id: user_id, role: role.to_string() });
            Ok(())
        })
    }

    async fn create_product(&self, new: NewProduct, actor: UserId) -> DomainResult<ProductMutation> {
        let mutation = self.mutate(|t, staged| {
            t.ensure_sku_free(&new.sku, None)?;
            t.ensure_category_exists(new.category_id)?;

            let now = Utc::now();
            let mutation = Product::register(new, actor, now)?;
            staged.push(Write::Actor(actor));
            staged.product_mutation(actor, &mutation);
            Ok(mutation)
        })?;
        log_mutation("create_product", &mutation);
        Ok(mutation)
    }

    async fn get_product(&self, id: ProductId) -> DomainResult<Product> {
        self.read()?.live_product(id).cloned()
    }

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> DomainResult<Page<Product>> {
        let tables = self.read()?;
        let mut rows: Vec<Product> = tables.products.values().filter(|p| filter.matches(p)).cloned().collect();
        rows.sort_by(|a, b| filter.compare(a, b));
        Ok(Page::from_vec(rows, page))
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        actor: UserId,
    ) -> DomainResult<ProductMutation> {
        let mutation = self.mutate(|t, staged| {
            let current = t.live_product(id)?.clone();
            if let Some(sku) = patch.sku.as_deref() {
                t.ensure_sku_free(sku, Some(id))?;
            }
            t.ensure_category_exists(patch.target_category())?;

            let now = Utc::now();
            let mutation = current.edit(patch, actor, now)?;
            staged.product_mutation(actor, &mutation);
            Ok(mutation)
        })?;
        log_mutation("update_product", &mutation);
        Ok(mutation)
    }

    async fn delete_product(&self, id: ProductId) -> DomainResult<Product> {
        let deleted = self.mutate(|t, staged| {
            let current = t.products.get(&id).ok_or(DomainError::not_found("product"))?;
            let deleted = current.soft_delete(Utc::now())?;
            staged.push(Write::Product(deleted.clone()));
            Ok(deleted)
        })?;
        tracing::info!(product_id = %id, "product soft-deleted");
        Ok(deleted)
    }

    async fn adjust_stock(
        &self,
        id: ProductId,
        adjustment: StockAdjustment,
        actor: UserId,
    ) -> DomainResult<ProductMutation> {
        let mutation = self.mutate(|t, staged| {
            let current = t.live_product(id)?.clone();
            let now = Utc::now();
            let mutation = current.adjust_stock(adjustment, actor, now)?;
            staged.product_mutation(actor, &mutation);
            Ok(mutation)
        })?;
        log_mutation("adjust_stock", &mutation);
        Ok(mutation)
    }

    async fn low_stock_products(&self, page: PageRequest) -> DomainResult<Page<Product>> {
        let tables = self.read()?;
        Ok(Page::from_vec(tables.by_status(StockStatus::LowStock), page))
    }

    async fn product_statistics(&self) -> DomainResult<ProductStatistics> {
        let t = self.read()?;
        let total_products = t.counted_products().count() as u64;
        let price_sum = reports::checked_sum(t.counted_products().map(|p| p.price))?;

        Ok(ProductStatistics {
            total_products,
            total_value: t.total_value()?,
            low_stock_count: t.by_status(StockStatus::LowStock).len() as u64,
            out_of_stock_count: t.by_status(StockStatus::OutOfStock).len() as u64,
            average_price: reports::average(price_sum, total_products),
            total_stock: t.counted_products().map(|p| p.stock_quantity).sum(),
        })
    }

    async fn create_category(&self, new: NewCategory) -> DomainResult<Category> {
        self.mutate(|t, staged| {
            new.validate()?;
            t.ensure_category_name_free(&new.name, None)?;
            let category = Category::create(new, Utc::now())?;
            staged.push(Write::Category(category.clone()));
            Ok(category)
        })
    }

    async fn get_category(&self, id: CategoryId) -> DomainResult<Category> {
        self.read()?
            .categories
            .get(&id)
            .cloned()
            .ok_or(DomainError::not_found("category"))
    }

    async fn category_products(&self, id: CategoryId, limit: usize) -> DomainResult<Vec<Product>> {
        let t = self.read()?;
        if !t.categories.contains_key(&id) {
            return Err(DomainError::not_found("category"));
        }
        let mut rows: Vec<Product> = t
            .live_products()
            .filter(|p| p.is_active && p.category_id == Some(id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list_categories(&self, search: Option<&str>) -> DomainResult<Vec<CategorySummary>> {
        let t = self.read()?;
        let term = search_term(search);
        let mut rows: Vec<CategorySummary> = t
            .summaries()
            .into_iter()
            .filter(|s| match &term {
                Some(term) => {
                    s.category.name.to_lowercase().contains(term)
                        || s.category
                            .description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(term))
                }
                None => true,
            })
            .collect();
        rows.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(rows)
    }

    async fn update_category(&self, id: CategoryId, patch: CategoryPatch) -> DomainResult<Category> {
        self.mutate(|t, staged| {
            let current = t.categories.get(&id).ok_or(DomainError::not_found("category"))?;
            let next = current.edit(patch, Utc::now())?;
            t.ensure_category_name_free(&next.name, Some(id))?;
            staged.push(Write::Category(next.clone()));
            Ok(next)
        })
    }

    async fn delete_category(&self, id: CategoryId) -> DomainResult<()> {
        self.mutate(|t, staged| {
            let category = t.categories.get(&id).ok_or(DomainError::not_found("category"))?;
            category.ensure_deletable(t.live_count(id))?;

            for p in t.products.values().filter(|p| p.category_id == Some(id)) {
                staged.push(Write::Product(Product { category_id: None, ..p.clone() }));
            }
            staged.push(Write::RemoveCategory(id));
            Ok(())
        })?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn list_movements(&self, filter: &MovementFilter, page: PageRequest) -> DomainResult<Page<StockMovement>> {
        let t = self.read()?;
        let rows: Vec<StockMovement> = t
            .movements_newest_first()
            .into_iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        Ok(Page::from_vec(rows, page))
    }

    async fn get_movement(&self, id: MovementId) -> DomainResult<StockMovement> {
        self.read()?
            .movements
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(DomainError::not_found("stock movement"))
    }

    async fn recent_movements(&self, limit: usize) -> DomainResult<Vec<StockMovement>> {
        let t = self.read()?;
        Ok(t.movements_newest_first().into_iter().take(limit).cloned().collect())
    }

    async fn product_movements(&self, product_id: ProductId, limit: usize) -> DomainResult<Vec<StockMovement>> {
        let t = self.read()?;
        Ok(t
            .movements_newest_first()
            .into_iter()
            .filter(|m| m.product_id == product_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn movement_statistics(&self, range: DateRange) -> DomainResult<MovementStatistics> {
        let t = self.read()?;
        let in_range: Vec<&StockMovement> = t.movements.iter().filter(|m| range.contains(m.movement_date)).collect();

        let mut products: Vec<ProductId> = in_range.iter().map(|m| m.product_id).collect();
        products.sort();
        products.dedup();

        let units = |effect: Effect| -> i64 {
            in_range
                .iter()
                .filter(|m| m.movement_type.effect() == effect)
                .map(|m| m.quantity_change.abs())
                .sum()
        };

        Ok(MovementStatistics {
            total_movements: in_range.len() as u64,
            total_entradas: units(Effect::Increase),
            total_salidas: units(Effect::Decrease),
            products_affected: products.len() as u64,
        })
    }

    async fn dashboard_statistics(&self, now: DateTime<Utc>) -> DomainResult<DashboardStatistics> {
        let t = self.read()?;
        let today = now.date_naive();
        let window_start = now - Duration::days(reports::DASHBOARD_WINDOW_DAYS);
        let recent: Vec<&StockMovement> = t.movements.iter().filter(|m| m.movement_date >= window_start).collect();

        let mut outbound: HashMap<ProductId, i64> = HashMap::new();
        for m in recent.iter().filter(|m| m.movement_type.is_outbound()) {
            *outbound.entry(m.product_id).or_default() += -m.quantity_change;
        }
        let mut top_products: Vec<TopProduct> = outbound
            .into_iter()
            .map(|(product_id, total_outbound)| {
                let (sku, name) = match t.products.get(&product_id) {
                    Some(p) => (p.sku.clone(), p.name.clone()),
                    None => Default::default(),
                };
                TopProduct { product_id, sku, name, total_outbound }
            })
            .collect();
        top_products.sort_by(|a, b| b.total_outbound.cmp(&a.total_outbound).then_with(|| a.sku.cmp(&b.sku)));
        top_products.truncate(reports::TOP_LIMIT);

        let mut top_categories = t.summaries();
        top_categories.sort_by(|a, b| {
            b.products_count
                .cmp(&a.products_count)
                .then_with(|| a.category.name.cmp(&b.category.name))
        });
        top_categories.truncate(reports::TOP_LIMIT);

        let movements_by_type = reports::type_counts(recent.iter().map(|m| (m.movement_type, 1)));

        let inventory_value_trend = (0..reports::VALUE_TREND_DAYS)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
            .map(|date| {
                let value = reports::inventory_value(
                    t.live_products().filter(|p| p.created_at.date_naive() <= date),
                )?;
                Ok(ValuePoint { date, value })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(DashboardStatistics {
            total_products: t.counted_products().count() as u64,
            total_categories: t.categories.len() as u64,
            total_users: t.users.len() as u64,
            total_value: t.total_value()?,
            low_stock_products: t.by_status(StockStatus::LowStock).len() as u64,
            out_of_stock_products: t.by_status(StockStatus::OutOfStock).len() as u64,
            today_movements: t
                .movements
                .iter()
                .filter(|m| m.movement_date.date_naive() == today)
                .count() as u64,
            top_products,
            top_categories,
            movements_by_type,
            inventory_value_trend,
        })
    }

    async fn stock_alerts(&self, limit: usize) -> DomainResult<StockAlerts> {
        let t = self.read()?;
        let mut low = t.by_status(StockStatus::LowStock);
        let mut out = t.by_status(StockStatus::OutOfStock);
        low.truncate(limit);
        out.truncate(limit);
        Ok(StockAlerts {
            low_stock_alerts: low,
            out_of_stock_alerts: out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_inventory::MovementType;

    fn price(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    async fn seeded(store: &InMemoryInventoryStore, sku: &str, stock: i64, minimum: i64) -> Product {
        let new = NewProduct::new(sku, format!("Producto {sku}"), price(1000)).with_stock(stock, minimum);
        store.create_product(new, UserId::new()).await.unwrap().product
    }

    async fn ledger_for(store: &InMemoryInventoryStore, id: ProductId) -> Vec<StockMovement> {
        store.product_movements(id, 100).await.unwrap()
    }

    #[tokio::test]
    async fn outbound_three_from_ten() {
        let store = InMemoryInventoryStore::new();
        let p = seeded(&store, "A-1", 10, 5).await;
        let actor = UserId::new();

        let out = store
            .adjust_stock(p.id, StockAdjustment::new(MovementType::Outbound, 3), actor)
            .await
            .unwrap();

        let reloaded = store.get_product(p.id).await.unwrap();
        assert_eq!(reloaded.stock_quantity, 7);
        assert_eq!(reloaded.stock_status(), StockStatus::InStock);

        let ledger = ledger_for(&store, p.id).await;
        assert_eq!(ledger.len(), 2);
        let latest = &ledger[0];
        assert_eq!(latest.id, out.movement.unwrap().id);
        assert_eq!((latest.previous_quantity, latest.new_quantity, latest.quantity_change), (10, 7, -3));
        assert_eq!(latest.user_id, actor);
    }

    #[tokio::test]
    async fn insufficient_stock_commits_nothing() {
        let store = InMemoryInventoryStore::new();
        let p = seeded(&store, "A-2", 10, 5).await;

        let err = store
            .adjust_stock(p.id, StockAdjustment::new(MovementType::Outbound, 20), UserId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::InsufficientStock { available: 10, requested: 20 }));
        assert_eq!(store.get_product(p.id).await.unwrap().stock_quantity, 10);
        assert_eq!(ledger_for(&store, p.id).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_unit_leaves_every_table_untouched() {
        let store = InMemoryInventoryStore::new();
        let p = seeded(&store, "A-9", 10, 5).await;
        let actor = UserId::new();

        let err = store
            .mutate(|t, staged| {
                let current = t.live_product(p.id)?.clone();
                let mutation = current.adjust_stock(StockAdjustment::new(MovementType::Inbound, 5), actor, Utc::now())?;
                staged.product_mutation(actor, &mutation);
                staged.push(Write::RemoveCategory(CategoryId::new()));
                Err::<(), _>(DomainError::persistence("disk full"))
            })
            .unwrap_err();

        assert_eq!(err.kind(), "persistence_failure");
        assert_eq!(store.get_product(p.id).await.unwrap().stock_quantity, 10);
        assert_eq!(ledger_for(&store, p.id).await.len(), 1);
        assert!(!store.read().unwrap().users.contains_key(&actor));
    }

    #[tokio::test]
    async fn oversized_values_never_reach_the_registry() {
        let store = InMemoryInventoryStore::new();
        seeded(&store, "OK-1", 4, 1).await;

        let huge = NewProduct::new("BIG", "Grande", Decimal::new(10_000_000_000, 0))
            .with_stock(9_000_000_000_000_000_000, 5);
        let err = store.create_product(huge, UserId::new()).await.unwrap_err();
        let DomainError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        assert!(errors.contains("price"));
        assert!(errors.contains("stock_quantity"));

        let stats = store.product_statistics().await.unwrap();
        assert_eq!(stats.total_products, 1);
        assert_eq!(stats.total_value, price(4000));
        assert!(store.dashboard_statistics(Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn creation_ledger_rows() {
        let store = InMemoryInventoryStore::new();
        let empty = seeded(&store, "A-3", 0, 5).await;
        assert!(ledger_for(&store, empty.id).await.is_empty());

        let stocked = seeded(&store, "A-4", 15, 5).await;
        let ledger = ledger_for(&store, stocked.id).await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].movement_type, MovementType::Inbound);
        assert_eq!((ledger[0].previous_quantity, ledger[0].new_quantity), (0, 15));
    }

    #[tokio::test]
    async fn adjustment_sets_absolute_count() {
        let store = InMemoryInventoryStore::new();
        let p = seeded(&store, "A-5", 7, 5).await;

        store
            .adjust_stock(p.id, StockAdjustment::new(MovementType::Adjustment, 4), UserId::new())
            .await
            .unwrap();

        let latest = &ledger_for(&store, p.id).await[0];
        assert_eq!(latest.movement_type, MovementType::Adjustment);
        assert_eq!((latest.previous_quantity, latest.new_quantity, latest.quantity_change), (7, 4, -3));
    }

    #[tokio::test]
    async fn category_in_use_cannot_be_deleted() {
        let store = InMemoryInventoryStore::new();
        let c = store.create_category(NewCategory::new("Herramientas")).await.unwrap();
        let new = NewProduct::new("A-6", "Martillo", price(1500)).with_category(c.id);
        store.create_product(new, UserId::new()).await.unwrap();

        let err = store.delete_category(c.id).await.unwrap_err();
        assert!(matches!(err, DomainError::ReferentialConflict(_)));
        assert_eq!(store.get_category(c.id).await.unwrap(), c);
    }

    #[tokio::test]
    async fn soft_deleted_products_release_their_category() {
        let store = InMemoryInventoryStore::new();
        let c = store.create_category(NewCategory::new("Temporada")).await.unwrap();
        let new = NewProduct::new("A-7", "Adorno", price(300)).with_category(c.id);
        let p = store.create_product(new, UserId::new()).await.unwrap().product;

        store.delete_product(p.id).await.unwrap();
        store.delete_category(c.id).await.unwrap();

        assert!(matches!(store.get_category(c.id).await, Err(DomainError::NotFound(_))));
        assert!(matches!(store.get_product(p.id).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn sku_is_unique_even_after_soft_delete() {
        let store = InMemoryInventoryStore::new();
        let p = seeded(&store, "DUP", 0, 5).await;
        store.delete_product(p.id).await.unwrap();

        let err = store
            .create_product(NewProduct::new("DUP", "Otro", price(100)), UserId::new())
            .await
            .unwrap_err();
        let DomainError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert!(fields.contains("sku"));
    }

    #[tokio::test]
    async fn unknown_category_is_a_validation_error() {
        let store = InMemoryInventoryStore::new();
        let new = NewProduct::new("A-8", "Sin categoria", price(100)).with_category(CategoryId::new());
        let err = store.create_product(new, UserId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(f) if f.contains("category_id")));
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let store = InMemoryInventoryStore::new();
        let p = seeded(&store, "A-9", 3, 1).await;
        store.delete_product(p.id).await.unwrap();
        assert_eq!(store.delete_product(p.id).await.unwrap_err(), DomainError::not_found("product"));

        // ledger entries survive with their snapshot
        let ledger = ledger_for(&store, p.id).await;
        assert_eq!(ledger[0].product_sku, "A-9");
    }

    #[tokio::test]
    async fn edit_routes_stock_change_through_ledger() {
        let store = InMemoryInventoryStore::new();
        let p = seeded(&store, "A-10", 10, 5).await;

        let patch = ProductPatch {
            stock_quantity: Some(12),
            ..ProductPatch::default()
        };
        store.update_product(p.id, patch, UserId::new()).await.unwrap();

        let patch = ProductPatch {
            name: Some("Renombrado".into()),
            ..ProductPatch::default()
        };
        store.update_product(p.id, patch, UserId::new()).await.unwrap();

        let ledger = ledger_for(&store, p.id).await;
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].quantity_change, 2);
        assert_eq!(store.get_product(p.id).await.unwrap().name, "Renombrado");
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let store = InMemoryInventoryStore::new();
        for (i, stock) in [0, 2, 50, 60].into_iter().enumerate() {
            seeded(&store, &format!("L-{i}"), stock, 5).await;
        }

        let filter = ProductFilter {
            stock_status: Some(StockStatus::InStock),
            ..ProductFilter::default()
        };
        let page = store.list_products(&filter, PageRequest::new(Some(1), Some(1), 15)).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.last_page(), 2);

        let filter = ProductFilter {
            search: Some("l-1".into()),
            ..ProductFilter::default()
        };
        let page = store.list_products(&filter, PageRequest::new(None, None, 15)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].sku, "L-1");

        let low = store.low_stock_products(PageRequest::new(None, None, 15)).await.unwrap();
        assert_eq!(low.total, 1);
        assert_eq!(low.items[0].stock_quantity, 2);
    }

    #[tokio::test]
    async fn statistics_and_alerts() {
        let store = InMemoryInventoryStore::new();
        let a = seeded(&store, "S-1", 10, 5).await;
        seeded(&store, "S-2", 0, 5).await;
        seeded(&store, "S-3", 3, 5).await;
        store
            .adjust_stock(a.id, StockAdjustment::new(MovementType::Sale, 4), UserId::new())
            .await
            .unwrap();

        let stats = store.product_statistics().await.unwrap();
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.total_stock, 9);
        assert_eq!(stats.total_value, price(9000));
        assert_eq!(stats.low_stock_count, 1);
        assert_eq!(stats.out_of_stock_count, 1);

        let mv = store.movement_statistics(DateRange::default()).await.unwrap();
        assert_eq!(mv.total_movements, 3);
        assert_eq!(mv.total_entradas, 13);
        assert_eq!(mv.total_salidas, 4);
        assert_eq!(mv.products_affected, 2);

        let dash = store.dashboard_statistics(Utc::now()).await.unwrap();
        assert_eq!(dash.today_movements, 3);
        assert_eq!(dash.top_products.len(), 1);
        assert_eq!(dash.top_products[0].total_outbound, 4);
        assert_eq!(dash.inventory_value_trend.len(), 7);
        assert_eq!(dash.inventory_value_trend[6].value, price(9000));
        assert!(dash.total_users >= 1);

        let alerts = store.stock_alerts(10).await.unwrap();
        assert_eq!(alerts.low_stock_alerts.len(), 1);
        assert_eq!(alerts.out_of_stock_alerts.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_outbound_never_oversells() {
        let store = std::sync::Arc::new(InMemoryInventoryStore::new());
        let id = seeded(&store, "C-1", 10, 0).await.id;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .adjust_stock(id, StockAdjustment::new(MovementType::Outbound, 1), UserId::new())
                    .await
                    .is_ok()
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() {
                ok += 1;
            }
        }

        assert_eq!(ok, 10);
        assert_eq!(store.get_product(id).await.unwrap().stock_quantity, 0);
        let ledger = ledger_for(&store, id).await;
        assert_eq!(ledger.len(), 11);
        assert!(ledger.iter().all(StockMovement::is_consistent));
    }
}
