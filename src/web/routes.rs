//! # Web API Route Definitions
//!
//! Every route answers a wrong method with a JSON 405 instead of axum's empty one.

use crate::web::handlers;
use crate::web::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Cached catalog lookups: `GET /search`, `GET /thing`
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/search",
            get(handlers::catalog::search).fallback(handlers::method_not_allowed),
        )
        .route(
            "/thing",
            get(handlers::catalog::thing).fallback(handlers::method_not_allowed),
        )
}

/// Privileged operations, wrapped in admin auth by the caller
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/cache/initialize",
            post(handlers::admin::initialize_cache).fallback(handlers::method_not_allowed),
        )
        .route(
            "/admin/metrics",
            get(handlers::admin::cache_metrics).fallback(handlers::method_not_allowed),
        )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route(
        "/health",
        get(handlers::health::health).fallback(handlers::method_not_allowed),
    )
}
