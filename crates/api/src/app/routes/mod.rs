use axum::{routing::get, Router};

pub mod categories;
pub mod common;
pub mod dashboard;
pub mod movements;
pub mod products;
pub mod system;

/// Router for every authenticated endpoint (mounted under `/api`).
pub fn router() -> Router {
    Router::new()
        .route("/user", get(system::current_user))
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/stock-movements", movements::router())
        .nest("/dashboard", dashboard::router())
}
