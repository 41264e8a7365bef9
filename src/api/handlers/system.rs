//! System endpoints: health check, build info, notification counters.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// Build and runtime information.
#[derive(Debug, Serialize, ToSchema)]
pub struct InfoResponse {
    version: String,
    debug_mode: bool,
    storage_type: String,
    auth_enabled: bool,
    git_commit: Option<String>,
    build_date: Option<String>,
    /// Stored items per resource.
    item_counts: BTreeMap<String, usize>,
}

/// Live counters of the notification layer.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationStatsResponse {
    /// Registered sessions.
    sessions: usize,
    /// (topic, session) pairs.
    subscriptions: usize,
    /// Distinct subscribed topics.
    topics: usize,
    events_published: u64,
    messages_queued: u64,
    messages_dropped: u64,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp. Also served under `/api/v1/health`.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /info`: Version and build information.
#[utoipa::path(
    get,
    path = "/api/v1/info",
    tag = "System",
    summary = "Server information",
    responses(
        (status = 200, description = "Server information", body = InfoResponse),
    )
)]
pub async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    let item_counts = state
        .inventory
        .counts()
        .await
        .into_iter()
        .map(|(kind, count)| (kind.as_str().to_string(), count))
        .collect();
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        debug_mode: config.debug_mode,
        storage_type: "memory".to_string(),
        auth_enabled: config.basic_auth.is_some(),
        git_commit: config.git_commit.clone(),
        build_date: config.build_date.clone(),
        item_counts,
    })
}

/// `GET /notifications`: Registry and dispatcher counters.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "System",
    summary = "Notification statistics",
    description = "Returns live session and subscription counts plus running publish totals.",
    responses(
        (status = 200, description = "Current counters", body = NotificationStatsResponse),
    )
)]
pub async fn notifications_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry();
    let stats = state.dispatcher.stats();
    Json(NotificationStatsResponse {
        sessions: registry.session_count(),
        subscriptions: registry.subscription_count(),
        topics: registry.topic_count(),
        events_published: stats.events_published,
        messages_queued: stats.messages_queued,
        messages_dropped: stats.messages_dropped,
    })
}

/// System routes relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/notifications", get(notifications_handler))
}

/// Unauthenticated routes mounted at the root level (not under /api/v1).
pub fn root_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
