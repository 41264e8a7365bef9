//! In-memory inventory storage for vendors, filaments and spools.
//!
//! [`InventoryStore`] keeps one ordered table per [`EntityKind`] behind a
//! [`tokio::sync::RwLock`]. It knows nothing about notifications; the
//! [`crate::service::InventoryService`] publishes a change event after each
//! successful mutation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::GatewayError;

/// Kind of inventory entity. Doubles as the first topic segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Filament manufacturer.
    Vendor,
    /// Filament product (material, colour, diameter...).
    Filament,
    /// Physical spool of a filament.
    Spool,
}

impl EntityKind {
    /// All kinds, in dependency order.
    pub const ALL: [Self; 3] = [Self::Vendor, Self::Filament, Self::Spool];

    /// Returns the path segment / resource name for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Filament => "filament",
            Self::Spool => "spool",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendor" => Ok(Self::Vendor),
            "filament" => Ok(Self::Filament),
            "spool" => Ok(Self::Spool),
            other => Err(GatewayError::UnknownResource(other.to_string())),
        }
    }
}

/// A stored inventory item.
///
/// `id` and `registered` are assigned by the store; everything else is a
/// free-form JSON object flattened next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Per-kind identifier, starting at 1.
    pub id: u64,
    /// Creation timestamp.
    pub registered: DateTime<Utc>,
    /// User-supplied attributes.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InventoryItem {
    /// Returns the id stored under `field` if it is a non-null integer.
    #[must_use]
    pub fn reference(&self, field: &str) -> Option<u64> {
        self.fields.get(field).and_then(Value::as_u64)
    }
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    items: BTreeMap<u64, InventoryItem>,
}

/// Result of [`InventoryStore::remove`].
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// The removed item.
    pub item: InventoryItem,
    /// Items whose reference to the removed item was dropped.
    pub detached: Vec<InventoryItem>,
}

/// Central store for all inventory items.
#[derive(Debug)]
pub struct InventoryStore {
    tables: RwLock<HashMap<EntityKind, Table>>,
}

impl InventoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let tables = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, Table::default()))
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Inserts a new item, assigning its id and registration time.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if a referenced vendor or
    /// filament does not exist.
    pub async fn insert(
        &self,
        kind: EntityKind,
        mut fields: Map<String, Value>,
    ) -> Result<InventoryItem, GatewayError> {
        strip_reserved(&mut fields);
        let mut tables = self.tables.write().await;
        check_references(&tables, kind, &fields, |_| true)?;

        let table = tables.entry(kind).or_default();
        table.next_id = table.next_id.saturating_add(1);
        let item = InventoryItem {
            id: table.next_id,
            registered: Utc::now(),
            fields,
        };
        table.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Returns a copy of the item.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ItemNotFound`] if no such item exists.
    pub async fn get(&self, kind: EntityKind, id: u64) -> Result<InventoryItem, GatewayError> {
        let tables = self.tables.read().await;
        tables
            .get(&kind)
            .and_then(|table| table.items.get(&id))
            .cloned()
            .ok_or(GatewayError::ItemNotFound { kind, id })
    }

    /// Returns `true` if the item exists.
    pub async fn contains(&self, kind: EntityKind, id: u64) -> bool {
        let tables = self.tables.read().await;
        tables
            .get(&kind)
            .is_some_and(|table| table.items.contains_key(&id))
    }

    /// Shallow-merges `patch` into an existing item. `null` values remove
    /// the field. Only reference fields named in `patch` are re-checked.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ItemNotFound`] if the item does not exist, or
    /// [`GatewayError::InvalidRequest`] if a patched reference names a
    /// missing vendor or filament.
    pub async fn update(
        &self,
        kind: EntityKind,
        id: u64,
        mut patch: Map<String, Value>,
    ) -> Result<InventoryItem, GatewayError> {
        strip_reserved(&mut patch);
        let mut tables = self.tables.write().await;

        let mut merged = tables
            .get(&kind)
            .and_then(|table| table.items.get(&id))
            .cloned()
            .ok_or(GatewayError::ItemNotFound { kind, id })?;
        let touched: Vec<String> = patch.keys().cloned().collect();
        for (key, value) in patch {
            if value.is_null() {
                merged.fields.remove(&key);
            } else {
                merged.fields.insert(key, value);
            }
        }
        check_references(&tables, kind, &merged.fields, |field| {
            touched.iter().any(|key| key == field)
        })?;

        let table = tables.entry(kind).or_default();
        table.items.insert(id, merged.clone());
        Ok(merged)
    }

    /// Removes an item.
    ///
    /// Removing a vendor detaches the filaments that referenced it (their
    /// `vendor_id` is dropped); those filaments are returned in
    /// [`Removal::detached`]. A filament still used by a spool cannot be
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ItemNotFound`] if the item does not exist,
    /// or [`GatewayError::InvalidRequest`] if spools reference the filament.
    pub async fn remove(&self, kind: EntityKind, id: u64) -> Result<Removal, GatewayError> {
        let mut tables = self.tables.write().await;
        let exists = tables
            .get(&kind)
            .is_some_and(|table| table.items.contains_key(&id));
        if !exists {
            return Err(GatewayError::ItemNotFound { kind, id });
        }

        if kind == EntityKind::Filament {
            let users: Vec<u64> = tables
                .get(&EntityKind::Spool)
                .map(|table| {
                    table
                        .items
                        .values()
                        .filter(|spool| spool.reference("filament_id") == Some(id))
                        .map(|spool| spool.id)
                        .collect()
                })
                .unwrap_or_default();
            if !users.is_empty() {
                return Err(GatewayError::InvalidRequest(format!(
                    "filament {id} is still used by spools {users:?}"
                )));
            }
        }

        let mut detached = Vec::new();
        if kind == EntityKind::Vendor {
            if let Some(filaments) = tables.get_mut(&EntityKind::Filament) {
                for filament in filaments.items.values_mut() {
                    if filament.reference("vendor_id") == Some(id) {
                        filament.fields.remove("vendor_id");
                        detached.push(filament.clone());
                    }
                }
            }
        }

        let item = tables
            .get_mut(&kind)
            .and_then(|table| table.items.remove(&id))
            .ok_or(GatewayError::ItemNotFound { kind, id })?;
        Ok(Removal { item, detached })
    }

    /// Returns all items of a kind ordered by id.
    pub async fn list(&self, kind: EntityKind) -> Vec<InventoryItem> {
        let tables = self.tables.read().await;
        tables
            .get(&kind)
            .map(|table| table.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of items of a kind.
    pub async fn len(&self, kind: EntityKind) -> usize {
        let tables = self.tables.read().await;
        tables.get(&kind).map_or(0, |table| table.items.len())
    }
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// `id` and `registered` belong to the store.
fn strip_reserved(fields: &mut Map<String, Value>) {
    fields.remove("id");
    fields.remove("registered");
}

/// Validates the reference fields for which `touched` returns `true`.
fn check_references<F>(
    tables: &HashMap<EntityKind, Table>,
    kind: EntityKind,
    fields: &Map<String, Value>,
    touched: F,
) -> Result<(), GatewayError>
where
    F: Fn(&str) -> bool,
{
    let exists = |target: EntityKind, id: u64| {
        tables
            .get(&target)
            .is_some_and(|table| table.items.contains_key(&id))
    };

    match kind {
        EntityKind::Vendor => Ok(()),
        EntityKind::Filament if !touched("vendor_id") => Ok(()),
        EntityKind::Spool if !touched("filament_id") => Ok(()),
        EntityKind::Filament => match fields.get("vendor_id") {
            None | Some(Value::Null) => Ok(()),
            Some(value) => match value.as_u64() {
                Some(id) if exists(EntityKind::Vendor, id) => Ok(()),
                _ => Err(GatewayError::InvalidRequest(format!(
                    "vendor_id {value} does not reference an existing vendor"
                ))),
            },
        },
        EntityKind::Spool => match fields.get("filament_id").and_then(Value::as_u64) {
            Some(id) if exists(EntityKind::Filament, id) => Ok(()),
            Some(id) => Err(GatewayError::InvalidRequest(format!(
                "filament_id {id} does not reference an existing filament"
            ))),
            None => Err(GatewayError::InvalidRequest(
                "spool requires an integer filament_id".to_string(),
            )),
        },
    }
}
