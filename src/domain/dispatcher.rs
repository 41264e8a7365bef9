//! Broadcast dispatcher: fans change events out to matching sessions.
//!
//! [`Dispatcher::publish`] looks the event topic up in the
//! [`SubscriberRegistry`], serializes the event once and offers the
//! shared text to every matched [`super::Session`] through its bounded
//! queue. It never waits: a full queue drops the message for that session
//! only, and a session that closes mid-publish simply misses the event.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;

use super::session::{EnqueueOutcome, Outbound};
use super::{ChangeEvent, SubscriberRegistry, TopicKey};

/// Outcome of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Sessions whose subscription matched the topic.
    pub matched: usize,
    /// Sessions that accepted the message onto their queue.
    pub queued: usize,
    /// Sessions whose queue was full.
    pub dropped: usize,
}

/// Running totals across all publishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Events published.
    pub events_published: u64,
    /// Messages placed on session queues.
    pub messages_queued: u64,
    /// Messages discarded because a session queue was full.
    pub messages_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    seq: AtomicU64,
    published: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
}

/// Entry point the data layer calls after a committed change.
///
/// Cheap to clone; all clones share the registry and counters.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<SubscriberRegistry>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given registry.
    #[must_use]
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            registry,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns the registry this dispatcher reads from.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Builds a [`ChangeEvent`] for `topic` and publishes it.
    pub fn notify(&self, topic: TopicKey, payload: serde_json::Value) -> DeliveryReport {
        let event = ChangeEvent {
            topic,
            seq: self.counters.seq.fetch_add(1, Ordering::Relaxed).saturating_add(1),
            timestamp: Utc::now(),
            payload,
        };
        self.publish(&event)
    }

    /// Delivers `event` to every session subscribed at its topic or at an
    /// ancestor of it.
    pub fn publish(&self, event: &ChangeEvent) -> DeliveryReport {
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        let sessions = self.registry.matches(&event.topic);
        let mut report = DeliveryReport {
            matched: sessions.len(),
            ..DeliveryReport::default()
        };
        if sessions.is_empty() {
            return report;
        }

        let text: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::warn!(topic = %event.topic, seq = event.seq, error = %e, "failed to serialize change event");
                return report;
            }
        };

        for session in sessions {
            match session.enqueue(Outbound::Text(Arc::clone(&text))) {
                EnqueueOutcome::Queued => report.queued += 1,
                EnqueueOutcome::Dropped => {
                    report.dropped += 1;
                    tracing::debug!(
                        session = %session.id(),
                        topic = %event.topic,
                        seq = event.seq,
                        "outbound queue full, dropping event"
                    );
                }
                EnqueueOutcome::Closed => {}
            }
        }

        self.counters
            .queued
            .fetch_add(report.queued as u64, Ordering::Relaxed);
        self.counters
            .dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    /// Returns running totals.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            events_published: self.counters.published.load(Ordering::Relaxed),
            messages_queued: self.counters.queued.load(Ordering::Relaxed),
            messages_dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}
