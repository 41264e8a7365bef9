//! WebSocket layer: upgrade handlers, session supervision, wire messages.
//!
//! Every WebSocket endpoint shares its path with a REST resource under
//! `/api/v1`; the path decides which topic the session starts on.

pub mod handler;
pub mod messages;
pub mod supervisor;

pub use supervisor::{CloseReason, Supervisor};
