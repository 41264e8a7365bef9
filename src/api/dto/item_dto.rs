//! Inventory item DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::InventoryItem;

/// Paginated list response for `GET /{kind}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ItemListResponse {
    /// Items on this page, ordered by id. Each is `{id, registered, ...fields}`.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<InventoryItem>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
