use axum::{
    extract::{Extension, Path},
    response::Response,
    routing::{get, post},
    Router,
};

use stockroom_auth::Permission;
use stockroom_core::ProductId;
use stockroom_infra::{
    PageRequest, ProductFilter, ProductSortField, SortDirection, PRODUCT_MOVEMENTS_LIMIT,
};
use stockroom_inventory::StockStatus;

use crate::app::dto::{self, ProductDetail, ProductResponse, StockUpdateResponse};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{self, parse_id, parse_query_id};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

const DEFAULT_PER_PAGE: u32 = 15;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/low-stock", get(low_stock))
        .route("/statistics", get(statistics))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/stock", post(update_stock))
}

pub async fn list_products(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::ProductListQuery>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::PRODUCTS_READ)?;

    let stock_status = match q.stock_status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(s) => Some(StockStatus::from_filter(s).ok_or_else(|| {
            stockroom_core::DomainError::invalid_field("stock_status", "stock_status must be one of: in, low, out")
        })?),
    };
    let filter = ProductFilter {
        search: q.search,
        category_id: parse_query_id(q.category_id.as_deref(), "category_id")?,
        stock_status,
        include_inactive: q.include_inactive.unwrap_or(false),
        sort_field: q.sort_field.as_deref().map(ProductSortField::parse).transpose()?.unwrap_or_default(),
        sort_direction: q.sort_direction.as_deref().map(SortDirection::parse).transpose()?.unwrap_or_default(),
    };
    let page = PageRequest::new(q.page, q.per_page, DEFAULT_PER_PAGE);

    let store = services.store.as_ref();
    let products = store.list_products(&filter, page).await?;
    let categories = common::category_lookup(store).await?;

    Ok(dto::paginated(
        products.try_map(|p| ProductResponse::with_lookup(p, &categories))?,
        "Productos obtenidos exitosamente",
    ))
}

pub async fn create_product(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateProductRequest>,
) -> Result<Response, ApiError> {
    let store = services.store.as_ref();
    let principal = common::writer(store, &principal, Permission::PRODUCTS_WRITE, &body).await?;

    let out = store.create_product(body.into(), principal.user_id).await?;
    let categories = common::category_lookup(store).await?;

    Ok(dto::created(
        ProductResponse::with_lookup(out.product, &categories)?,
        "Producto creado exitosamente",
    ))
}

pub async fn get_product(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::PRODUCTS_READ)?;
    let id: ProductId = parse_id(&id, "product")?;

    let store = services.store.as_ref();
    let product = store.get_product(id).await?;
    let category = match product.category_id {
        Some(cid) => Some(dto::CategoryBrief::from(&store.get_category(cid).await?)),
        None => None,
    };
    let stock_movements = store.product_movements(id, PRODUCT_MOVEMENTS_LIMIT).await?;

    Ok(dto::ok(
        ProductDetail {
            product: ProductResponse::new(product, category)?,
            stock_movements: dto::movements(stock_movements),
        },
        "Producto obtenido exitosamente",
    ))
}

pub async fn update_product(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateProductRequest>,
) -> Result<Response, ApiError> {
    let store = services.store.as_ref();
    let principal = common::writer(store, &principal, Permission::PRODUCTS_WRITE, &body).await?;
    let id: ProductId = parse_id(&id, "product")?;

    let out = store.update_product(id, body.into(), principal.user_id).await?;
    let categories = common::category_lookup(store).await?;

    Ok(dto::ok(
        ProductResponse::with_lookup(out.product, &categories)?,
        "Producto actualizado exitosamente",
    ))
}

pub async fn delete_product(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::PRODUCTS_DELETE)?;
    let id: ProductId = parse_id(&id, "product")?;

    services.store.delete_product(id).await?;
    Ok(dto::done("Producto eliminado exitosamente"))
}

pub async fn update_stock(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::StockAdjustmentRequest>,
) -> Result<Response, ApiError> {
    let store = services.store.as_ref();
    let principal = common::writer(store, &principal, Permission::STOCK_ADJUST, &body).await?;
    let id: ProductId = parse_id(&id, "product")?;

    let out = store.adjust_stock(id, body.into(), principal.user_id).await?;

    Ok(dto::ok(
        StockUpdateResponse {
            product: ProductResponse::bare(out.product)?,
            movement: out.movement.map(dto::MovementResponse::from),
        },
        "Stock actualizado exitosamente",
    ))
}

pub async fn low_stock(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::PageQuery>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::PRODUCTS_READ)?;
    let page = PageRequest::new(q.page, q.per_page, DEFAULT_PER_PAGE);

    let products = services.store.low_stock_products(page).await?;
    Ok(dto::paginated(
        products.try_map(ProductResponse::bare)?,
        "Productos con stock bajo obtenidos exitosamente",
    ))
}

pub async fn statistics(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::REPORTS_READ)?;
    let stats = services.store.product_statistics().await?;
    Ok(dto::ok(stats, "Estadísticas obtenidas exitosamente"))
}
