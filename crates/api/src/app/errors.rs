//! Error envelope: `{success: false, error, message, errors?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use stockroom_auth::AuthzError;
use stockroom_core::{DomainError, FieldErrors};

/// Anything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::Domain(DomainError::Validation(field_errors(&e)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Forbidden(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
        }
    }
}

pub fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::Validation(_) | DomainError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::ReferentialConflict(_) => StatusCode::CONFLICT,
        DomainError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn domain_error_to_response(e: DomainError) -> Response {
    let status = status_for(&e);
    match e {
        DomainError::Validation(fields) => (
            status,
            axum::Json(json!({
                "success": false,
                "error": "validation_error",
                "message": "the given data was invalid",
                "errors": fields,
            })),
        )
            .into_response(),
        DomainError::Persistence(msg) => {
            // Details stay in the logs.
            tracing::error!(error = %msg, "storage failure");
            json_error(status, "persistence_failure", "internal storage error")
        }
        other => json_error(status, other.kind(), other.to_string()),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Flatten `validator` output into the domain's field → message map.
pub fn field_errors(e: &validator::ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    for (field, errs) in e.field_errors() {
        let field = field.to_string();
        for err in errs.iter() {
            let message = match &err.message {
                Some(m) => m.to_string(),
                None => format!("{field} is invalid ({})", err.code),
            };
            out.add(field.clone(), message);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_status_codes() {
        assert_eq!(
            status_for(&DomainError::invalid_field("sku", "taken")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&DomainError::InsufficientStock { available: 1, requested: 2 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&DomainError::not_found("product")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&DomainError::conflict("in use")), StatusCode::CONFLICT);
        assert_eq!(status_for(&DomainError::persistence("down")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let res = ApiError::from(AuthzError::Forbidden("products.write".into())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
