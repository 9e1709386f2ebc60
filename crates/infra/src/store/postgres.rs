//! Postgres-backed registry and ledger.
//!
//! Every stock mutation runs in one transaction: the product row is locked
//! with `SELECT ... FOR UPDATE`, the domain transition is applied, and the
//! product update plus the ledger insert commit together.
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | DomainError |
//! |-----------------|-------------|
//! | `23505` unique violation | `Validation` on the offending field (`sku`, `name`) |
//! | `23514` check violation | `Validation` |
//! | `22003` numeric out of range | `Validation` |
//! | `23503` foreign key violation | `ReferentialConflict` |
//! | anything else | `Persistence` |

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_core::{CategoryId, DomainError, DomainResult, MovementId, ProductId, UserId};
use stockroom_inventory::{
    Category, CategoryPatch, Effect, MovementType, NewCategory, NewProduct, Product, ProductMutation, ProductPatch,
    StockAdjustment, StockMovement, StockStatus,
};

use super::query::{DateRange, MovementFilter, Page, PageRequest, ProductFilter, search_term};
use super::reports::{
    self, CategorySummary, DashboardStatistics, MovementStatistics, ProductStatistics, StockAlerts, TopProduct,
    ValuePoint,
};
use super::InventoryStore;

const PRODUCT_COLUMNS: &str = "id, sku, name, description, category_id, stock_quantity, minimum_stock, price, \
     cost_price, location, image_url, barcode, unit, weight, dimensions, is_active, created_at, updated_at, deleted_at";

const CATEGORY_COLUMNS: &str = "id, name, description, color, icon, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, product_sku, product_name, user_id, type, quantity_change, \
     previous_quantity, new_quantity, reason, reference, movement_date";

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations under `crates/infra/migrations`.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::persistence(format!("migration failed: {e}")))
    }

    async fn begin(&self, operation: &str) -> DomainResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| map_sqlx_error(operation, e))
    }

    async fn fetch_products(&self, operation: &str, mut qb: QueryBuilder<'_, Postgres>) -> DomainResult<Vec<Product>> {
        let rows: Vec<ProductRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn fetch_count(&self, operation: &str, mut qb: QueryBuilder<'_, Postgres>) -> DomainResult<u64> {
        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        let n: i64 = row.try_get(0).map_err(|e| map_sqlx_error(operation, e))?;
        Ok(n.max(0) as u64)
    }

    async fn count_scalar(&self, operation: &str, sql: &str) -> DomainResult<u64> {
        let n: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(n.max(0) as u64)
    }

    async fn products_by_status(&self, status: StockStatus, limit: u64, offset: u64) -> DomainResult<Vec<Product>> {
        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL AND "));
        qb.push(status_predicate(status));
        qb.push(" ORDER BY stock_quantity ASC, name ASC LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);
        self.fetch_products("products_by_status", qb).await
    }

    async fn count_by_status(&self, status: StockStatus) -> DomainResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL AND ");
        qb.push(status_predicate(status));
        self.fetch_count("count_by_status", qb).await
    }
}

// transaction helpers

async fn lock_product(
    tx: &mut Transaction<'static, Postgres>,
    id: ProductId,
    include_deleted: bool,
) -> DomainResult<Product> {
    let sql = if include_deleted {
        format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE")
    } else {
        format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
    };
    let row: Option<ProductRow> = sqlx::query_as(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;
    row.map(Product::from).ok_or(DomainError::not_found("product"))
}

async fn ensure_sku_free(
    tx: &mut Transaction<'static, Postgres>,
    sku: &str,
    except: Option<ProductId>,
) -> DomainResult<()> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM products WHERE sku = $1 AND ($2::uuid IS NULL OR id <> $2))",
    )
    .bind(sku.trim())
    .bind(except.map(Uuid::from))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_sku_free", e))?;

    if taken {
        return Err(DomainError::invalid_field("sku", "sku has already been taken"));
    }
    Ok(())
}

async fn ensure_category_exists(tx: &mut Transaction<'static, Postgres>, id: Option<CategoryId>) -> DomainResult<()> {
    let Some(id) = id else {
        return Ok(());
    };
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
        .bind(id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("ensure_category_exists", e))?;

    if !exists {
        return Err(DomainError::invalid_field("category_id", "selected category does not exist"));
    }
    Ok(())
}

async fn ensure_actor(tx: &mut Transaction<'static, Postgres>, actor: UserId) -> DomainResult<()> {
    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(actor.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("ensure_actor", e))?;
    Ok(())
}

async fn insert_product(tx: &mut Transaction<'static, Postgres>, p: &Product) -> DomainResult<()> {
    sqlx::query(&format!(
        "INSERT INTO products ({PRODUCT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
    ))
    .bind(p.id.as_uuid())
    .bind(&p.sku)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.category_id.map(Uuid::from))
    .bind(p.stock_quantity)
    .bind(p.minimum_stock)
    .bind(p.price)
    .bind(p.cost_price)
    .bind(&p.location)
    .bind(&p.image_url)
    .bind(&p.barcode)
    .bind(&p.unit)
    .bind(p.weight)
    .bind(&p.dimensions)
    .bind(p.is_active)
    .bind(p.created_at)
    .bind(p.updated_at)
    .bind(p.deleted_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_product", e))?;
    Ok(())
}

async fn save_product(tx: &mut Transaction<'static, Postgres>, p: &Product) -> DomainResult<()> {
    sqlx::query(
        r#"
        UPDATE products SET
            sku = $2, name = $3, description = $4, category_id = $5, stock_quantity = $6,
            minimum_stock = $7, price = $8, cost_price = $9, location = $10, image_url = $11,
            barcode = $12, unit = $13, weight = $14, dimensions = $15, is_active = $16,
            updated_at = $17, deleted_at = $18
        WHERE id = $1
        "#,
    )
    .bind(p.id.as_uuid())
    .bind(&p.sku)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.category_id.map(Uuid::from))
    .bind(p.stock_quantity)
    .bind(p.minimum_stock)
    .bind(p.price)
    .bind(p.cost_price)
    .bind(&p.location)
    .bind(&p.image_url)
    .bind(&p.barcode)
    .bind(&p.unit)
    .bind(p.weight)
    .bind(&p.dimensions)
    .bind(p.is_active)
    .bind(p.updated_at)
    .bind(p.deleted_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("save_product", e))?;
    Ok(())
}

async fn insert_movement(tx: &mut Transaction<'static, Postgres>, m: &StockMovement) -> DomainResult<()> {
    sqlx::query(&format!(
        "INSERT INTO stock_movements ({MOVEMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
    ))
    .bind(m.id.as_uuid())
    .bind(m.product_id.as_uuid())
    .bind(&m.product_sku)
    .bind(&m.product_name)
    .bind(m.user_id.as_uuid())
    .bind(m.movement_type.as_str())
    .bind(m.quantity_change)
    .bind(m.previous_quantity)
    .bind(m.new_quantity)
    .bind(&m.reason)
    .bind(&m.reference)
    .bind(m.movement_date)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

async fn persist_mutation(
    tx: &mut Transaction<'static, Postgres>,
    mutation: &ProductMutation,
    actor: UserId,
) -> DomainResult<()> {
    save_product(tx, &mutation.product).await?;
    if let Some(movement) = &mutation.movement {
        ensure_actor(tx, actor).await?;
        insert_movement(tx, movement).await?;
        tracing::info!(
            product_id = %movement.product_id,
            movement_type = %movement.movement_type,
            previous = movement.previous_quantity,
            new = movement.new_quantity,
            "stock changed"
        );
    }
    Ok(())
}

async fn commit(tx: Transaction<'static, Postgres>, operation: &str) -> DomainResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error(operation, e))
}

// SQL fragments

fn status_predicate(status: StockStatus) -> &'static str {
    match status {
        StockStatus::OutOfStock => "stock_quantity <= 0",
        StockStatus::LowStock => "stock_quantity > 0 AND stock_quantity <= minimum_stock",
        StockStatus::InStock => "stock_quantity > minimum_stock",
    }
}

/// `'entrada', 'compra'` style list for the types with `effect`.
fn type_list(effect: Effect) -> String {
    MovementType::ALL
        .into_iter()
        .filter(|t| t.effect() == effect)
        .map(|t| format!("'{}'", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE deleted_at IS NULL");
    if !filter.include_inactive {
        qb.push(" AND is_active");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(Uuid::from(category_id));
    }
    if let Some(status) = filter.stock_status {
        qb.push(" AND ").push(status_predicate(status));
    }
    if let Some(term) = search_term(filter.search.as_deref()) {
        let pattern = like_pattern(&term);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_movement_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &MovementFilter) {
    qb.push(" WHERE TRUE");
    if let Some(t) = filter.movement_type {
        qb.push(" AND type = ").push_bind(t.as_str());
    }
    if let Some(product_id) = filter.product_id {
        qb.push(" AND product_id = ").push_bind(Uuid::from(product_id));
    }
    push_range(qb, filter.range);
    if let Some(term) = search_term(filter.search.as_deref()) {
        let pattern = like_pattern(&term);
        qb.push(" AND (product_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR product_sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_range(qb: &mut QueryBuilder<'_, Postgres>, range: DateRange) {
    if let Some(start) = range.start {
        qb.push(" AND movement_date >= ").push_bind(start);
    }
    if let Some(end) = range.end {
        qb.push(" AND movement_date <= ").push_bind(end);
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn record_user(&self, user_id: UserId, role: &str) -> DomainResult<()> {
        sqlx::query("INSERT INTO users (id, role) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET role = EXCLUDED.role")
            .bind(user_id.as_uuid())
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, new), fields(sku = %new.sku, actor = %actor), err)]
    async fn create_product(&self, new: NewProduct, actor: UserId) -> DomainResult<ProductMutation> {
        let mut tx = self.begin("create_product").await?;
        ensure_sku_free(&mut tx, &new.sku, None).await?;
        ensure_category_exists(&mut tx, new.category_id).await?;

        let mutation = Product::register(new, actor, Utc::now())?;
        insert_product(&mut tx, &Product {
            stock_quantity: 0,
            ..mutation.product.clone()
        })
        .await?;
        persist_mutation(&mut tx, &mutation, actor).await?;
        commit(tx, "create_product").await?;
        Ok(mutation)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> DomainResult<Product> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_product", e))?;
        row.map(Product::from).ok_or(DomainError::not_found("product"))
    }

    #[instrument(skip(self, filter), err)]
    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> DomainResult<Page<Product>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut count, filter);
        let total = self.fetch_count("list_products", count).await?;

        let column = filter.sort_field.column();
        let direction = filter.sort_direction.sql();
        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filter(&mut qb, filter);
        qb.push(format!(" ORDER BY {column} {direction}, id {direction} LIMIT "));
        qb.push_bind(page.limit() as i64);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset() as i64);
        let items = self.fetch_products("list_products", qb).await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    #[instrument(skip(self, patch), fields(product_id = %id, actor = %actor), err)]
    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        actor: UserId,
    ) -> DomainResult<ProductMutation> {
        let mut tx = self.begin("update_product").await?;
        let current = lock_product(&mut tx, id, false).await?;
        if let Some(sku) = patch.sku.as_deref() {
            ensure_sku_free(&mut tx, sku, Some(id)).await?;
        }
        ensure_category_exists(&mut tx, patch.target_category()).await?;

        let mutation = current.edit(patch, actor, Utc::now())?;
        persist_mutation(&mut tx, &mutation, actor).await?;
        commit(tx, "update_product").await?;
        Ok(mutation)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> DomainResult<Product> {
        let mut tx = self.begin("delete_product").await?;
        let current = lock_product(&mut tx, id, true).await?;
        let deleted = current.soft_delete(Utc::now())?;
        save_product(&mut tx, &deleted).await?;
        commit(tx, "delete_product").await?;
        tracing::info!(product_id = %id, "product soft-deleted");
        Ok(deleted)
    }

    #[instrument(
        skip(self, adjustment),
        fields(product_id = %id, movement_type = %adjustment.movement_type, quantity = adjustment.quantity, actor = %actor),
        err
    )]
    async fn adjust_stock(
        &self,
        id: ProductId,
        adjustment: StockAdjustment,
        actor: UserId,
    ) -> DomainResult<ProductMutation> {
        let mut tx = self.begin("adjust_stock").await?;
        let current = lock_product(&mut tx, id, false).await?;
        let mutation = current.adjust_stock(adjustment, actor, Utc::now())?;
        persist_mutation(&mut tx, &mutation, actor).await?;
        commit(tx, "adjust_stock").await?;
        Ok(mutation)
    }

    #[instrument(skip(self), err)]
    async fn low_stock_products(&self, page: PageRequest) -> DomainResult<Page<Product>> {
        let total = self.count_by_status(StockStatus::LowStock).await?;
        let items = self
            .products_by_status(StockStatus::LowStock, page.limit(), page.offset())
            .await?;
        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    #[instrument(skip(self), err)]
    async fn product_statistics(&self) -> DomainResult<ProductStatistics> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE is_active) AS total_products,
                COALESCE(SUM(stock_quantity * price) FILTER (WHERE is_active), 0) AS total_value,
                COUNT(*) FILTER (WHERE stock_quantity > 0 AND stock_quantity <= minimum_stock) AS low_stock_count,
                COUNT(*) FILTER (WHERE stock_quantity <= 0) AS out_of_stock_count,
                COALESCE(SUM(price) FILTER (WHERE is_active), 0) AS price_sum,
                COALESCE(SUM(stock_quantity) FILTER (WHERE is_active), 0)::BIGINT AS total_stock
            FROM products
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_statistics", e))?;

        let stats = ProductStatsRow::from_row(&row).map_err(|e| map_sqlx_error("product_statistics", e))?;
        let total_products = stats.total_products.max(0) as u64;
        Ok(ProductStatistics {
            total_products,
            total_value: stats.total_value,
            low_stock_count: stats.low_stock_count.max(0) as u64,
            out_of_stock_count: stats.out_of_stock_count.max(0) as u64,
            average_price: reports::average(stats.price_sum, total_products),
            total_stock: stats.total_stock,
        })
    }

    #[instrument(skip(self, new), fields(name = %new.name), err)]
    async fn create_category(&self, new: NewCategory) -> DomainResult<Category> {
        let category = Category::create(new, Utc::now())?;
        sqlx::query(&format!(
            "INSERT INTO categories ({CATEGORY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_category", e))?;
        Ok(category)
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn get_category(&self, id: CategoryId) -> DomainResult<Category> {
        let row: Option<CategoryRow> =
            sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_category", e))?;
        row.map(Category::from).ok_or(DomainError::not_found("category"))
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn category_products(&self, id: CategoryId, limit: usize) -> DomainResult<Vec<Product>> {
        self.get_category(id).await?;
        let mut qb = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL AND is_active AND category_id = "
        ));
        qb.push_bind(Uuid::from(id));
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit as i64);
        self.fetch_products("category_products", qb).await
    }

    #[instrument(skip(self), err)]
    async fn list_categories(&self, search: Option<&str>) -> DomainResult<Vec<CategorySummary>> {
        let mut qb = QueryBuilder::new(
            "SELECT c.id, c.name, c.description, c.color, c.icon, c.created_at, c.updated_at, \
             (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id AND p.deleted_at IS NULL) AS products_count \
             FROM categories c",
        );
        if let Some(term) = search_term(search) {
            let pattern = like_pattern(&term);
            qb.push(" WHERE c.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.description ILIKE ")
                .push_bind(pattern);
        }
        qb.push(" ORDER BY c.name ASC");

        let rows: Vec<CategoryCountRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        Ok(rows.into_iter().map(CategorySummary::from).collect())
    }

    #[instrument(skip(self, patch), fields(category_id = %id), err)]
    async fn update_category(&self, id: CategoryId, patch: CategoryPatch) -> DomainResult<Category> {
        let mut tx = self.begin("update_category").await?;
        let row: Option<CategoryRow> =
            sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 FOR UPDATE"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_category", e))?;
        let current = row.map(Category::from).ok_or(DomainError::not_found("category"))?;

        let next = current.edit(patch, Utc::now())?;
        sqlx::query(
            "UPDATE categories SET name = $2, description = $3, color = $4, icon = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(next.id.as_uuid())
        .bind(&next.name)
        .bind(&next.description)
        .bind(&next.color)
        .bind(&next.icon)
        .bind(next.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_category", e))?;

        commit(tx, "update_category").await?;
        Ok(next)
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn delete_category(&self, id: CategoryId) -> DomainResult<()> {
        let mut tx = self.begin("delete_category").await?;
        let row: Option<CategoryRow> =
            sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 FOR UPDATE"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_category", e))?;
        let category = row.map(Category::from).ok_or(DomainError::not_found("category"))?;

        let in_use: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = $1 AND deleted_at IS NULL")
                .bind(id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_category", e))?;
        category.ensure_deletable(in_use.max(0) as u64)?;

        // soft-deleted products still pointing here are cleared by ON DELETE SET NULL
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;

        commit(tx, "delete_category").await?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    #[instrument(skip(self, filter), err)]
    async fn list_movements(&self, filter: &MovementFilter, page: PageRequest) -> DomainResult<Page<StockMovement>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM stock_movements");
        push_movement_filter(&mut count, filter);
        let total = self.fetch_count("list_movements", count).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements"));
        push_movement_filter(&mut qb, filter);
        qb.push(" ORDER BY movement_date DESC, id DESC LIMIT ");
        qb.push_bind(page.limit() as i64);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset() as i64);

        let rows: Vec<MovementRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_movements", e))?;

        Ok(Page {
            items: rows.into_iter().map(StockMovement::from).collect(),
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn get_movement(&self, id: MovementId) -> DomainResult<StockMovement> {
        let row: Option<MovementRow> =
            sqlx::query_as(&format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_movement", e))?;
        row.map(StockMovement::from).ok_or(DomainError::not_found("stock movement"))
    }

    #[instrument(skip(self), err)]
    async fn recent_movements(&self, limit: usize) -> DomainResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements ORDER BY movement_date DESC, id DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_movements", e))?;
        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn product_movements(&self, product_id: ProductId, limit: usize) -> DomainResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = $1 \
             ORDER BY movement_date DESC, id DESC LIMIT $2"
        ))
        .bind(product_id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_movements", e))?;
        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn movement_statistics(&self, range: DateRange) -> DomainResult<MovementStatistics> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT COUNT(*) AS total_movements, \
             COALESCE(SUM(ABS(quantity_change)) FILTER (WHERE type IN ({inbound})), 0)::BIGINT AS total_entradas, \
             COALESCE(SUM(ABS(quantity_change)) FILTER (WHERE type IN ({outbound})), 0)::BIGINT AS total_salidas, \
             COUNT(DISTINCT product_id) AS products_affected \
             FROM stock_movements WHERE TRUE",
            inbound = type_list(Effect::Increase),
            outbound = type_list(Effect::Decrease),
        ));
        push_range(&mut qb, range);

        let row: MovementStatsRow = qb
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("movement_statistics", e))?;

        Ok(MovementStatistics {
            total_movements: row.total_movements.max(0) as u64,
            total_entradas: row.total_entradas,
            total_salidas: row.total_salidas,
            products_affected: row.products_affected.max(0) as u64,
        })
    }

    #[instrument(skip(self), err)]
    async fn dashboard_statistics(&self, now: DateTime<Utc>) -> DomainResult<DashboardStatistics> {
        let products = self.product_statistics().await?;
        let total_categories = self.count_scalar("dashboard_statistics", "SELECT COUNT(*) FROM categories").await?;
        let total_users = self.count_scalar("dashboard_statistics", "SELECT COUNT(*) FROM users").await?;

        let today = now.date_naive();
        let day_start = today.and_hms_opt(0, 0, 0).map(|t| t.and_utc()).unwrap_or(now);
        let today_movements: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_movements WHERE movement_date >= $1 AND movement_date < $2",
        )
        .bind(day_start)
        .bind(day_start + Duration::days(1))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard_statistics", e))?;

        let window_start = now - Duration::days(reports::DASHBOARD_WINDOW_DAYS);

        let top_rows: Vec<TopProductRow> = sqlx::query_as(&format!(
            "SELECT m.product_id, p.sku, p.name, SUM(-m.quantity_change)::BIGINT AS total_outbound \
             FROM stock_movements m JOIN products p ON p.id = m.product_id \
             WHERE m.type IN ({outbound}) AND m.movement_date >= $1 \
             GROUP BY m.product_id, p.sku, p.name \
             ORDER BY total_outbound DESC, p.sku ASC LIMIT $2",
            outbound = type_list(Effect::Decrease),
        ))
        .bind(window_start)
        .bind(reports::TOP_LIMIT as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard_statistics", e))?;

        let category_rows: Vec<CategoryCountRow> = sqlx::query_as(
            "SELECT c.id, c.name, c.description, c.color, c.icon, c.created_at, c.updated_at, \
             COUNT(p.id) AS products_count \
             FROM categories c LEFT JOIN products p ON p.category_id = c.id AND p.deleted_at IS NULL \
             GROUP BY c.id ORDER BY products_count DESC, c.name ASC LIMIT $1",
        )
        .bind(reports::TOP_LIMIT as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard_statistics", e))?;

        let type_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT type, COUNT(*) FROM stock_movements WHERE movement_date >= $1 GROUP BY type",
        )
        .bind(window_start)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard_statistics", e))?;
        let movements_by_type = reports::type_counts(
            type_rows
                .into_iter()
                .filter_map(|(t, n)| t.parse::<MovementType>().ok().map(|t| (t, n.max(0) as u64))),
        );

        let days: Vec<NaiveDate> = (0..reports::VALUE_TREND_DAYS)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
            .collect();
        let trend_rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            "SELECT d.day, COALESCE(SUM(p.stock_quantity * p.price), 0) \
             FROM UNNEST($1::date[]) AS d(day) \
             LEFT JOIN products p ON p.deleted_at IS NULL AND (p.created_at AT TIME ZONE 'UTC')::date <= d.day \
             GROUP BY d.day ORDER BY d.day",
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard_statistics", e))?;

        Ok(DashboardStatistics {
            total_products: products.total_products,
            total_categories,
            total_users,
            total_value: products.total_value,
            low_stock_products: products.low_stock_count,
            out_of_stock_products: products.out_of_stock_count,
            today_movements: today_movements.max(0) as u64,
            top_products: top_rows.into_iter().map(TopProduct::from).collect(),
            top_categories: category_rows.into_iter().map(CategorySummary::from).collect(),
            movements_by_type,
            inventory_value_trend: trend_rows
                .into_iter()
                .map(|(date, value)| ValuePoint { date, value })
                .collect(),
        })
    }

    #[instrument(skip(self), err)]
    async fn stock_alerts(&self, limit: usize) -> DomainResult<StockAlerts> {
        Ok(StockAlerts {
            low_stock_alerts: self.products_by_status(StockStatus::LowStock, limit as u64, 0).await?,
            out_of_stock_alerts: self.products_by_status(StockStatus::OutOfStock, limit as u64, 0).await?,
        })
    }
}

/// Map SQLx errors onto the domain taxonomy (see module docs).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            map_sqlstate(db_err.code().as_deref(), db_err.constraint(), msg)
        }
        sqlx::Error::PoolClosed => DomainError::persistence(format!("connection pool closed in {operation}")),
        _ => DomainError::persistence(format!("sqlx error in {operation}: {err}")),
    }
}

fn map_sqlstate(code: Option<&str>, constraint: Option<&str>, msg: String) -> DomainError {
    match code {
        Some("23505") => {
            let field = unique_field(constraint);
            DomainError::invalid_field(field, format!("{field} has already been taken"))
        }
        Some("23514") => {
            let field = constraint.map(check_field).unwrap_or("record");
            DomainError::invalid_field(field, format!("{field} violates a check constraint"))
        }
        Some("22003") => DomainError::invalid_field("record", "a numeric value is out of range"),
        Some("23503") => DomainError::conflict(msg),
        _ => DomainError::persistence(msg),
    }
}

fn unique_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("products_sku_key") => "sku",
        Some("categories_name_key") => "name",
        _ => "id",
    }
}

fn check_field(constraint: &str) -> &'static str {
    match constraint {
        "products_stock_quantity_check" => "stock_quantity",
        "products_minimum_stock_check" => "minimum_stock",
        "products_price_check" => "price",
        "products_cost_price_check" => "cost_price",
        "categories_color_check" => "color",
        _ => "record",
    }
}

// SQLx row types

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    category_id: Option<Uuid>,
    stock_quantity: i64,
    minimum_stock: i64,
    price: Decimal,
    cost_price: Option<Decimal>,
    location: Option<String>,
    image_url: Option<String>,
    barcode: Option<String>,
    unit: String,
    weight: Option<Decimal>,
    dimensions: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            sku: row.sku,
            name: row.name,
            description: row.description,
            category_id: row.category_id.map(CategoryId::from_uuid),
            stock_quantity: row.stock_quantity,
            minimum_stock: row.minimum_stock,
            price: row.price,
            cost_price: row.cost_price,
            location: row.location,
            image_url: row.image_url,
            barcode: row.barcode,
            unit: row.unit,
            weight: row.weight,
            dimensions: row.dimensions,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    color: String,
    icon: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            color: row.color,
            icon: row.icon,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CategoryCountRow {
    #[sqlx(flatten)]
    category: CategoryRow,
    products_count: i64,
}

impl From<CategoryCountRow> for CategorySummary {
    fn from(row: CategoryCountRow) -> Self {
        CategorySummary {
            category: row.category.into(),
            products_count: row.products_count.max(0) as u64,
        }
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    product_sku: String,
    product_name: String,
    user_id: Uuid,
    movement_type: MovementType,
    quantity_change: i64,
    previous_quantity: i64,
    new_quantity: i64,
    reason: Option<String>,
    reference: Option<String>,
    movement_date: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let raw_type: String = row.try_get("type")?;
        let movement_type = raw_type.parse::<MovementType>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "type".to_string(),
            source: Box::new(e),
        })?;

        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            product_sku: row.try_get("product_sku")?,
            product_name: row.try_get("product_name")?,
            user_id: row.try_get("user_id")?,
            movement_type,
            quantity_change: row.try_get("quantity_change")?,
            previous_quantity: row.try_get("previous_quantity")?,
            new_quantity: row.try_get("new_quantity")?,
            reason: row.try_get("reason")?,
            reference: row.try_get("reference")?,
            movement_date: row.try_get("movement_date")?,
        })
    }
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: MovementId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            product_sku: row.product_sku,
            product_name: row.product_name,
            user_id: UserId::from_uuid(row.user_id),
            movement_type: row.movement_type,
            quantity_change: row.quantity_change,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            reason: row.reason,
            reference: row.reference,
            movement_date: row.movement_date,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductStatsRow {
    total_products: i64,
    total_value: Decimal,
    low_stock_count: i64,
    out_of_stock_count: i64,
    price_sum: Decimal,
    total_stock: i64,
}

#[derive(Debug, FromRow)]
struct MovementStatsRow {
    total_movements: i64,
    total_entradas: i64,
    total_salidas: i64,
    products_affected: i64,
}

#[derive(Debug, FromRow)]
struct TopProductRow {
    product_id: Uuid,
    sku: String,
    name: String,
    total_outbound: i64,
}

impl From<TopProductRow> for TopProduct {
    fn from(row: TopProductRow) -> Self {
        TopProduct {
            product_id: ProductId::from_uuid(row.product_id),
            sku: row.sku,
            name: row.name,
            total_outbound: row.total_outbound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstates_map_to_domain_errors() {
        let err = map_sqlstate(Some("22003"), None, "numeric field overflow".into());
        let DomainError::Validation(errors) = err else {
            panic!("out-of-range numerics are validation errors");
        };
        assert!(errors.contains("record"));

        let err = map_sqlstate(Some("23505"), Some("products_sku_key"), String::new());
        assert!(matches!(&err, DomainError::Validation(e) if e.contains("sku")));

        let err = map_sqlstate(Some("23514"), Some("products_price_check"), String::new());
        assert!(matches!(&err, DomainError::Validation(e) if e.contains("price")));

        assert_eq!(map_sqlstate(Some("23503"), None, "fk".into()).kind(), "referential_conflict");
        assert_eq!(map_sqlstate(Some("40001"), None, "retry".into()).kind(), "persistence_failure");
    }

    #[test]
    fn type_lists_follow_effect() {
        assert_eq!(type_list(Effect::Increase), "'entrada', 'compra'");
        assert_eq!(type_list(Effect::Decrease), "'salida', 'venta'");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn constraint_names_map_to_fields() {
        assert_eq!(unique_field(Some("products_sku_key")), "sku");
        assert_eq!(unique_field(Some("categories_name_key")), "name");
        assert_eq!(check_field("products_stock_quantity_check"), "stock_quantity");
    }

    #[test]
    fn non_database_errors_are_persistence_failures() {
        let err = map_sqlx_error("get_product", sqlx::Error::PoolClosed);
        assert!(matches!(err, DomainError::Persistence(_)));
        let err = map_sqlx_error("get_product", sqlx::Error::RowNotFound);
        assert!(matches!(err, DomainError::Persistence(_)));
    }
}
