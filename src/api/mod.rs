//! REST API layer: route handlers, DTOs, auth and router composition.
//!
//! All resource endpoints are mounted under `/api/v1` behind
//! [`auth::require_basic_auth`]; `/health` is also served unauthenticated
//! at the root.

pub mod auth;
pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::ws::handler::root_ws_handler;

/// Builds the complete API router with all REST and WebSocket endpoints.
pub fn build_router(state: &AppState) -> Router<AppState> {
    let api = Router::new()
        .nest("/api/v1", handlers::routes())
        .route("/api/v1/", get(root_ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ))
        .merge(handlers::system::root_routes());
    openapi::mount(api)
}

/// Builds the router with tracing, CORS and timeout layers and binds the
/// state, ready for `axum::serve`.
pub fn build_app(state: AppState) -> Router {
    with_http_layers(build_router(&state), &state.config).with_state(state)
}

/// Wraps `router` in the request timeout, tracing and CORS layers.
///
/// Requests exceeding [`GatewayConfig::request_timeout`] are answered with
/// 408.
pub fn with_http_layers(router: Router<AppState>, config: &GatewayConfig) -> Router<AppState> {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
