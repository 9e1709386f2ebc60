//! HTTP application wiring (Axum router + layers).
//!
//! - `services.rs`: shared handles (the inventory store)
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: request/response shapes and the success envelope
//! - `errors.rs`: error envelope and status mapping
//! - `extract.rs`: body/query extractors that reject through the envelope

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router.
///
/// `cors_origin` restricts browser access to one origin; `None` allows any.
pub fn build_app(
    services: services::AppServices,
    jwt_secret: &str,
    cors_origin: Option<&str>,
) -> anyhow::Result<Router> {
    let jwt = Arc::new(stockroom_auth::Hs256JwtValidator::new(jwt_secret));
    let auth_state = middleware::AuthState { jwt };

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let allow_origin = match cors_origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{origin}'"))?,
        ),
        None => AllowOrigin::from(Any),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]);

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors)))
}
