//! Axum WebSocket upgrade handlers.
//!
//! The topic of a new session comes from the request path: `/api/v1/` is
//! the root topic, `/api/v1/{kind}` a kind and `/api/v1/{kind}/{id}` a
//! single item. The REST handlers in [`crate::api::handlers::items`] share
//! those paths and hand upgrade requests to [`open_session`].

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use crate::app_state::AppState;
use crate::domain::{EntityKind, TopicKey};
use crate::error::GatewayError;

/// `GET /api/v1/`: Upgrade to a session subscribed to every change.
pub async fn root_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, GatewayError> {
    open_session(ws, &state, None, None).await
}

/// Validates the path and upgrades the connection to a session at the
/// derived topic.
///
/// Validation runs before the upgrade, so a rejected request never
/// creates a session.
///
/// # Errors
///
/// Returns [`GatewayError::ItemNotFound`] if `id` names a missing item,
/// or [`GatewayError::ShuttingDown`] once shutdown was requested.
pub async fn open_session(
    ws: WebSocketUpgrade,
    state: &AppState,
    kind: Option<EntityKind>,
    id: Option<u64>,
) -> Result<Response, GatewayError> {
    if let (Some(kind), Some(id)) = (kind, id) {
        if !state.inventory.exists(kind, id).await {
            return Err(GatewayError::ItemNotFound { kind, id });
        }
    }
    if state.supervisor.is_shutting_down() {
        return Err(GatewayError::ShuttingDown);
    }

    let topic = TopicKey::from_path(kind, id);
    let supervisor = state.supervisor.clone();
    Ok(ws
        .on_failed_upgrade(|e| tracing::debug!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| async move { supervisor.run(socket, topic).await }))
}
