//! # Web API Module
//!
//! Axum HTTP surface of the gateway.
//!
//! - [`routes`] - route groups: catalog, admin, health
//! - [`handlers`] - request handlers per route group
//! - [`middleware`] - admin bearer-token auth and request ids
//! - [`response_types`] - `{ "error", "details" }` error responses
//! - [`state`] - shared application state

pub mod handlers;
pub mod middleware;
pub mod response_types;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

/// Create the main Axum application with all routes and middleware
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = app_state.config.web.request_timeout();

    let protected_routes = routes::admin_routes().layer(axum::middleware::from_fn_with_state(
        app_state.clone(),
        middleware::auth::require_admin,
    ));

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::catalog_routes())
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(
            middleware::request_id::add_request_id,
        ))
        .layer(tower_http::timeout::TimeoutLayer::new(request_timeout))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
