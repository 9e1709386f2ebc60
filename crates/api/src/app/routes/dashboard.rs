use axum::{extract::Extension, response::Response, routing::get, Router};
use chrono::Utc;

use stockroom_auth::Permission;
use stockroom_infra::store::reports::ALERT_LIMIT;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

const RECENT_ACTIVITY_LIMIT: usize = 15;

pub fn router() -> Router {
    Router::new()
        .route("/statistics", get(statistics))
        .route("/recent-activity", get(recent_activity))
        .route("/alerts", get(alerts))
}

pub async fn statistics(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::REPORTS_READ)?;
    let stats = services.store.dashboard_statistics(Utc::now()).await?;
    Ok(dto::ok(stats, "Estadísticas del dashboard obtenidas exitosamente"))
}

pub async fn recent_activity(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::REPORTS_READ)?;
    let movements = services.store.recent_movements(RECENT_ACTIVITY_LIMIT).await?;
    Ok(dto::ok(dto::movements(movements), "Actividad reciente obtenida exitosamente"))
}

pub async fn alerts(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    authz::require(&principal, Permission::REPORTS_READ)?;
    let alerts = services.store.stock_alerts(ALERT_LIMIT).await?;
    Ok(dto::ok(alerts, "Alertas obtenidas exitosamente"))
}
