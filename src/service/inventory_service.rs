//! Inventory service: CRUD on the store, then a change notification.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::{
    ChangeKind, DeliveryReport, Dispatcher, EntityKind, InventoryChange, InventoryItem,
    InventoryStore,
};
use crate::error::GatewayError;

/// Orchestration layer for inventory mutations.
///
/// Every mutation follows the same pattern: commit to the
/// [`InventoryStore`] (the store lock is released on return), then hand an
/// [`InventoryChange`] to the [`Dispatcher`] at topic `[kind, id]`.
/// Failed mutations publish nothing.
#[derive(Debug, Clone)]
pub struct InventoryService {
    store: Arc<InventoryStore>,
    dispatcher: Dispatcher,
}

impl InventoryService {
    /// Creates a new `InventoryService`.
    #[must_use]
    pub fn new(store: Arc<InventoryStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Returns a reference to the inner [`Dispatcher`].
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Creates an item.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if a referenced item does
    /// not exist.
    pub async fn create(
        &self,
        kind: EntityKind,
        fields: Map<String, Value>,
    ) -> Result<InventoryItem, GatewayError> {
        let item = self.store.insert(kind, fields).await?;
        let report = self.publish(ChangeKind::Added, kind, &item);
        tracing::info!(%kind, id = item.id, delivered = report.queued, "item created");
        Ok(item)
    }

    /// Returns a single item.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ItemNotFound`] if it does not exist.
    pub async fn get(&self, kind: EntityKind, id: u64) -> Result<InventoryItem, GatewayError> {
        self.store.get(kind, id).await
    }

    /// Returns `true` if the item exists.
    pub async fn exists(&self, kind: EntityKind, id: u64) -> bool {
        self.store.contains(kind, id).await
    }

    /// Returns all items of a kind, ordered by id.
    pub async fn list(&self, kind: EntityKind) -> Vec<InventoryItem> {
        self.store.list(kind).await
    }

    /// Returns the number of stored items per kind.
    pub async fn counts(&self) -> Vec<(EntityKind, usize)> {
        let mut counts = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            counts.push((kind, self.store.len(kind).await));
        }
        counts
    }

    /// Applies a shallow patch to an item.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ItemNotFound`] if the item does not exist,
    /// or [`GatewayError::InvalidRequest`] if the result references a
    /// missing item.
    pub async fn update(
        &self,
        kind: EntityKind,
        id: u64,
        patch: Map<String, Value>,
    ) -> Result<InventoryItem, GatewayError> {
        let item = self.store.update(kind, id, patch).await?;
        let report = self.publish(ChangeKind::Updated, kind, &item);
        tracing::info!(%kind, id, delivered = report.queued, "item updated");
        Ok(item)
    }

    /// Deletes an item, returning its last state.
    ///
    /// Filaments detached from a deleted vendor are announced as updated.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ItemNotFound`] if it does not exist, or
    /// [`GatewayError::InvalidRequest`] if the item is still referenced.
    pub async fn delete(&self, kind: EntityKind, id: u64) -> Result<InventoryItem, GatewayError> {
        let removal = self.store.remove(kind, id).await?;
        let report = self.publish(ChangeKind::Deleted, kind, &removal.item);
        for filament in &removal.detached {
            self.publish(ChangeKind::Updated, EntityKind::Filament, filament);
        }
        tracing::info!(
            %kind,
            id,
            detached = removal.detached.len(),
            delivered = report.queued,
            "item deleted"
        );
        Ok(removal.item)
    }

    fn publish(&self, change: ChangeKind, kind: EntityKind, item: &InventoryItem) -> DeliveryReport {
        let change = InventoryChange::new(change, kind, item.clone());
        let topic = change.topic();
        match serde_json::to_value(&change) {
            Ok(payload) => self.dispatcher.notify(topic, payload),
            Err(e) => {
                tracing::warn!(%topic, error = %e, "failed to serialize inventory change");
                DeliveryReport::default()
            }
        }
    }
}
