use axum::{
    extract::{Extension, Path},
    response::Response,
    routing::get,
    Router,
};

use stockroom_auth::Permission;
use stockroom_core::{DomainError, MovementId};
use stockroom_infra::{DateRange, MovementFilter, PageRequest};
use stockroom_inventory::MovementType;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiQuery;
use crate::app::routes::common::{parse_id, parse_query_id};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

const DEFAULT_PER_PAGE: u32 = 20;
const RECENT_LIMIT: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_movements))
        .route("/statistics", get(statistics))
        .route("/recent", get(recent))
        .route("/:id", get(get_movement))
}

fn date_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange, DomainError> {
    DateRange::new(
        dto::parse_date_bound("start_date", start, false)?,
        dto::parse_date_bound("end_date", end, true)?,
    )
}

pub async fn list_movements(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::MovementListQuery>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::MOVEMENTS_READ)?;

    let movement_type = match q.movement_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(s) => Some(s.parse::<MovementType>()?),
    };
    let filter = MovementFilter {
        movement_type,
        product_id: parse_query_id(q.product_id.as_deref(), "product_id")?,
        range: date_range(q.start_date.as_deref(), q.end_date.as_deref())?,
        search: q.search,
    };
    let page = PageRequest::new(q.page, q.per_page, DEFAULT_PER_PAGE);

    let movements = services.store.list_movements(&filter, page).await?;
    Ok(dto::paginated(
        movements.map(dto::MovementResponse::from),
        "Movimientos obtenidos exitosamente",
    ))
}

pub async fn get_movement(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::MOVEMENTS_READ)?;
    let id: MovementId = parse_id(&id, "stock movement")?;

    let movement = services.store.get_movement(id).await?;
    Ok(dto::ok(dto::MovementResponse::from(movement), "Movimiento obtenido exitosamente"))
}

pub async fn statistics(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::DateRangeQuery>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::REPORTS_READ)?;
    let range = date_range(q.start_date.as_deref(), q.end_date.as_deref())?;

    let stats = services.store.movement_statistics(range).await?;
    Ok(dto::ok(stats, "Estadísticas de movimientos obtenidas exitosamente"))
}

pub async fn recent(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::MOVEMENTS_READ)?;
    let movements = services.store.recent_movements(RECENT_LIMIT).await?;
    Ok(dto::ok(dto::movements(movements), "Movimientos recientes obtenidos exitosamente"))
}
