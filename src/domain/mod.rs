//! Domain layer: topic keys, sessions, the subscriber registry, the
//! broadcast dispatcher and the inventory store.
//!
//! Data flow for a change notification:
//!
//! ```text
//! InventoryService ──notify(topic, payload)──▶ Dispatcher
//!                                                  │ matches(topic)
//!                                                  ▼
//!                                         SubscriberRegistry
//!                                                  │ Arc<Session> per match
//!                                                  ▼
//!                                  Session::enqueue (bounded, drop on full)
//!                                                  │
//!                                                  ▼
//!                                   ws::Supervisor writer task ──▶ client
//! ```

pub mod change_event;
pub mod dispatcher;
pub mod inventory;
pub mod session;
pub mod subscriber_registry;
pub mod topic_key;

pub use change_event::{ChangeEvent, ChangeKind, InventoryChange};
pub use dispatcher::{DeliveryReport, Dispatcher, DispatcherStats};
pub use inventory::{EntityKind, InventoryItem, InventoryStore, Removal};
pub use session::{EnqueueOutcome, Outbound, Session, SessionId, SessionState};
pub use subscriber_registry::SubscriberRegistry;
pub use topic_key::TopicKey;
