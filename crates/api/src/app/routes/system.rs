use axum::{extract::Extension, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use stockroom_auth::Principal;

use crate::app::dto;
use crate::context::PrincipalContext;

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// The caller as seen by the API: id, roles, and effective permissions.
pub async fn current_user(Extension(principal): Extension<PrincipalContext>) -> axum::response::Response {
    let resolved = Principal::from_roles(principal.user_id(), principal.roles().to_vec());
    dto::ok(
        json!({
            "id": resolved.user_id,
            "role": resolved.primary_role(),
            "roles": resolved.roles,
            "permissions": resolved.permissions,
        }),
        "Usuario obtenido exitosamente",
    )
}
