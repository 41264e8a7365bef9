//! Inventory item handlers: list, create, get, update, delete.
//!
//! `GET` on a collection or item path doubles as the WebSocket endpoint for
//! that topic: a request carrying upgrade headers is handed to
//! [`crate::ws::handler::open_session`] instead of being answered with JSON.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};

use crate::api::dto::{ItemListResponse, PaginationParams};
use crate::app_state::AppState;
use crate::domain::EntityKind;
use crate::error::{ErrorResponse, GatewayError};
use crate::ws::handler::{open_session, root_ws_handler};

/// `GET /{kind}`: List items of a kind, or subscribe to the kind.
///
/// # Errors
///
/// Returns [`GatewayError::UnknownResource`] for an unknown kind.
#[utoipa::path(
    get,
    path = "/api/v1/{kind}",
    tag = "Items",
    summary = "List items",
    description = "Returns a paginated list of items ordered by id. With WebSocket upgrade headers the connection is upgraded and receives every change to items of this kind.",
    params(
        ("kind" = String, Path, description = "vendor, filament or spool"),
        PaginationParams,
    ),
    responses(
        (status = 200, description = "Paginated item list", body = ItemListResponse),
        (status = 101, description = "Switched to WebSocket"),
        (status = 404, description = "Unknown resource", body = ErrorResponse),
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<PaginationParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, GatewayError> {
    let kind: EntityKind = kind.parse()?;
    if let Ok(ws) = ws {
        return open_session(ws, &state, Some(kind), None).await;
    }

    let items = state.inventory.list(kind).await;
    let (data, pagination) = params.paginate(items);
    Ok(Json(ItemListResponse { data, pagination }).into_response())
}

/// `POST /{kind}`: Create an item.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown kind or a dangling reference.
#[utoipa::path(
    post,
    path = "/api/v1/{kind}",
    tag = "Items",
    summary = "Create an item",
    description = "Stores a new item from a JSON object and notifies subscribers of the new item, its kind and the root. `id` and `registered` are assigned by the server.",
    params(("kind" = String, Path, description = "vendor, filament or spool")),
    responses(
        (status = 201, description = "Item created"),
        (status = 400, description = "Invalid reference", body = ErrorResponse),
        (status = 404, description = "Unknown resource", body = ErrorResponse),
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, GatewayError> {
    let kind: EntityKind = kind.parse()?;
    let item = state.inventory.create(kind, fields).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `GET /{kind}/{id}`: Get an item, or subscribe to it.
///
/// # Errors
///
/// Returns [`GatewayError::ItemNotFound`] if the item does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/{kind}/{id}",
    tag = "Items",
    summary = "Get an item",
    description = "Returns a single item. With WebSocket upgrade headers the connection is upgraded and receives every change to this item.",
    params(
        ("kind" = String, Path, description = "vendor, filament or spool"),
        ("id" = u64, Path, description = "Item id"),
    ),
    responses(
        (status = 200, description = "The item"),
        (status = 101, description = "Switched to WebSocket"),
        (status = 404, description = "Item not found", body = ErrorResponse),
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, u64)>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, GatewayError> {
    let kind: EntityKind = kind.parse()?;
    if let Ok(ws) = ws {
        return open_session(ws, &state, Some(kind), Some(id)).await;
    }
    let item = state.inventory.get(kind, id).await?;
    Ok(Json(item).into_response())
}

/// `PATCH /{kind}/{id}`: Update an item.
///
/// # Errors
///
/// Returns [`GatewayError`] if the item does not exist or the patch
/// leaves a dangling reference.
#[utoipa::path(
    patch,
    path = "/api/v1/{kind}/{id}",
    tag = "Items",
    summary = "Update an item",
    description = "Shallow-merges a JSON object into the item. `null` removes a field.",
    params(
        ("kind" = String, Path, description = "vendor, filament or spool"),
        ("id" = u64, Path, description = "Item id"),
    ),
    responses(
        (status = 200, description = "The updated item"),
        (status = 400, description = "Invalid reference", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, u64)>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, GatewayError> {
    let kind: EntityKind = kind.parse()?;
    let item = state.inventory.update(kind, id, patch).await?;
    Ok(Json(item))
}

/// `DELETE /{kind}/{id}`: Delete an item.
///
/// # Errors
///
/// Returns [`GatewayError::ItemNotFound`] if the item does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/{kind}/{id}",
    tag = "Items",
    summary = "Delete an item",
    params(
        ("kind" = String, Path, description = "vendor, filament or spool"),
        ("id" = u64, Path, description = "Item id"),
    ),
    description = "Deleting a vendor detaches its filaments. A filament still used by a spool cannot be deleted.",
    responses(
        (status = 204, description = "Item deleted"),
        (status = 400, description = "Item is still referenced", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, u64)>,
) -> Result<impl IntoResponse, GatewayError> {
    let kind: EntityKind = kind.parse()?;
    state.inventory.delete(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Item routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_ws_handler))
        .route("/{kind}", get(list_items).post(create_item))
        .route(
            "/{kind}/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
}
