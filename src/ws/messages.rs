//! WebSocket message types: server messages and client commands.
//!
//! Change frames are serialized straight from
//! [`crate::domain::ChangeEvent`] and share the `kind` discriminator used
//! here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::TopicKey;

/// Liveness status reported in heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The server is up and the session is registered.
    Healthy,
}

/// Server → client message, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a liveness check: `{"kind": "heartbeat", "status": "healthy"}`.
    Heartbeat {
        /// Always [`HealthStatus::Healthy`].
        status: HealthStatus,
    },
    /// Acknowledges a `subscribe` command.
    Subscribed {
        /// The topic now subscribed.
        topic: TopicKey,
    },
    /// Acknowledges an `unsubscribe` command.
    Unsubscribed {
        /// The topic no longer subscribed.
        topic: TopicKey,
    },
    /// A command could not be honoured.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerMessage {
    /// The heartbeat message.
    #[must_use]
    pub const fn heartbeat() -> Self {
        Self::Heartbeat {
            status: HealthStatus::Healthy,
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes the message into a shareable text frame.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if serialization fails.
    pub fn encode(&self) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }
}

/// Client → server commands.
///
/// Text frames that do not parse as a command are treated as liveness
/// checks and answered with [`ServerMessage::heartbeat`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Add a topic to this connection.
    Subscribe {
        /// Topic segments, e.g. `["spool", "5"]`.
        topic: TopicKey,
    },
    /// Remove a topic from this connection.
    Unsubscribe {
        /// Topic segments.
        topic: TopicKey,
    },
}

impl ClientCommand {
    /// Parses a text frame. Returns `None` for anything that is not a
    /// well-formed command.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
