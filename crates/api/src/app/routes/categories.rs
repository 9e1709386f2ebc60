use axum::{
    extract::{Extension, Path},
    response::Response,
    routing::get,
    Router,
};
use validator::Validate;

use stockroom_auth::Permission;
use stockroom_core::{CategoryId, DomainResult};
use stockroom_infra::CATEGORY_PRODUCTS_LIMIT;

use crate::app::dto::{self, CategoryDetail, ProductResponse};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", get(get_category).put(update_category).delete(delete_category))
}

pub async fn list_categories(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::CategoryListQuery>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::CATEGORIES_READ)?;
    let categories = services.store.list_categories(q.search.as_deref()).await?;
    Ok(dto::ok(categories, "Categorías obtenidas exitosamente"))
}

pub async fn create_category(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateCategoryRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::CATEGORIES_WRITE)?;
    body.validate()?;

    let category = services.store.create_category(body.into()).await?;
    Ok(dto::created(category, "Categoría creada exitosamente"))
}

pub async fn get_category(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::CATEGORIES_READ)?;
    let id: CategoryId = parse_id(&id, "category")?;

    let category = services.store.get_category(id).await?;
    let brief = dto::CategoryBrief::from(&category);
    let products = services
        .store
        .category_products(id, CATEGORY_PRODUCTS_LIMIT)
        .await?
        .into_iter()
        .map(|p| ProductResponse::new(p, Some(brief.clone())))
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(dto::ok(CategoryDetail { category, products }, "Categoría obtenida exitosamente"))
}

pub async fn update_category(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateCategoryRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::CATEGORIES_WRITE)?;
    let id: CategoryId = parse_id(&id, "category")?;
    body.validate()?;

    let category = services.store.update_category(id, body.into()).await?;
    Ok(dto::ok(category, "Categoría actualizada exitosamente"))
}

pub async fn delete_category(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::CATEGORIES_DELETE)?;
    let id: CategoryId = parse_id(&id, "category")?;

    services.store.delete_category(id).await?;
    Ok(dto::done("Categoría eliminada exitosamente"))
}
