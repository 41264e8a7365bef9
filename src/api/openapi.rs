//! OpenAPI document and optional Swagger UI.

use axum::Router;
use utoipa::OpenApi;

use super::dto::{ItemListResponse, PaginationMeta};
use super::handlers::{items, system};
use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "spool-gateway",
        description = "Filament spool inventory with live WebSocket change notifications"
    ),
    paths(
        items::list_items,
        items::create_item,
        items::get_item,
        items::update_item,
        items::delete_item,
        system::health_handler,
        system::info_handler,
        system::notifications_handler,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        PaginationMeta,
        ItemListResponse,
        system::HealthResponse,
        system::InfoResponse,
        system::NotificationStatsResponse,
    )),
    tags(
        (name = "Items", description = "Vendors, filaments and spools"),
        (name = "System", description = "Health, build info and notification counters"),
    )
)]
pub struct ApiDoc;

/// Mounts Swagger UI at `/swagger-ui` when the `swagger-ui` feature is on.
#[cfg(feature = "swagger-ui")]
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

/// Returns the router unchanged; Swagger UI is compiled out.
#[cfg(not(feature = "swagger-ui"))]
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
}
