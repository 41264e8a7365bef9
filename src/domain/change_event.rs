//! Change events flowing from the data layer to subscribers.
//!
//! The core treats [`ChangeEvent::payload`] as opaque JSON. The inventory
//! service fills it with an [`InventoryChange`] describing what happened to
//! which item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TopicKey;
use super::inventory::{EntityKind, InventoryItem};

/// A "topic X changed" notification.
///
/// Transient: built by [`super::Dispatcher::notify`], fanned out once and
/// dropped. Serializes as the `change` frame sent to subscribers:
///
/// ```json
/// {"kind": "change", "topic": ["spool", "5"], "seq": 1, "timestamp": "...", "payload": {}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename = "change")]
pub struct ChangeEvent {
    /// Topic of the entity that changed.
    pub topic: TopicKey,
    /// Diagnostic sequence number. Monotonic per dispatcher; carries no
    /// ordering guarantee across topics.
    pub seq: u64,
    /// Time the event was published.
    pub timestamp: DateTime<Utc>,
    /// Opaque payload forwarded verbatim.
    pub payload: serde_json::Value,
}

/// What happened to an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The item was created.
    Added,
    /// The item was modified.
    Updated,
    /// The item was removed.
    Deleted,
}

impl ChangeKind {
    /// Returns the change kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// Payload published by the inventory service after each committed change.
///
/// ```json
/// {"type": "updated", "resource": "spool", "date": "...", "payload": {"id": 5, ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryChange {
    /// Kind of change.
    #[serde(rename = "type")]
    pub change: ChangeKind,
    /// Entity kind of the item.
    pub resource: EntityKind,
    /// Time of the change.
    pub date: DateTime<Utc>,
    /// The item after the change (before it, for deletions).
    pub payload: InventoryItem,
}

impl InventoryChange {
    /// Creates a change record timestamped now.
    #[must_use]
    pub fn new(change: ChangeKind, resource: EntityKind, payload: InventoryItem) -> Self {
        Self {
            change,
            resource,
            date: Utc::now(),
            payload,
        }
    }

    /// Topic under which this change is published: `[resource, id]`.
    #[must_use]
    pub fn topic(&self) -> TopicKey {
        TopicKey::for_entity(self.resource, self.payload.id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn item(id: u64) -> InventoryItem {
        let mut fields = Map::new();
        fields.insert("remaining_weight".to_string(), serde_json::json!(250.5));
        InventoryItem {
            id,
            registered: Utc::now(),
            fields,
        }
    }

    #[test]
    fn topic_is_resource_and_id() {
        let change = InventoryChange::new(ChangeKind::Updated, EntityKind::Spool, item(5));
        assert_eq!(change.topic(), TopicKey::new(["spool", "5"]));
    }

    #[test]
    fn serializes_with_type_field() {
        let change = InventoryChange::new(ChangeKind::Deleted, EntityKind::Filament, item(2));
        let Ok(json) = serde_json::to_value(&change) else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("type"), Some(&serde_json::json!("deleted")));
        assert_eq!(json.get("resource"), Some(&serde_json::json!("filament")));
        assert_eq!(
            json.pointer("/payload/remaining_weight"),
            Some(&serde_json::json!(250.5))
        );
        assert_eq!(json.pointer("/payload/id"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn change_kind_strings() {
        assert_eq!(ChangeKind::Added.as_str(), "added");
        assert_eq!(ChangeKind::Updated.as_str(), "updated");
        assert_eq!(ChangeKind::Deleted.as_str(), "deleted");
    }

    #[test]
    fn event_serializes_as_change_frame() {
        let event = ChangeEvent {
            topic: TopicKey::new(["spool", "1"]),
            seq: 7,
            timestamp: Utc::now(),
            payload: serde_json::json!({"status": "healthy"}),
        };
        let Ok(value) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(value.get("kind"), Some(&serde_json::json!("change")));
        assert_eq!(value.get("topic"), Some(&serde_json::json!(["spool", "1"])));
        assert_eq!(value.get("seq"), Some(&serde_json::json!(7)));
        assert_eq!(value.get("status"), None);
    }
}
