//! Topic → session index used to fan change events out.
//!
//! [`SubscriberRegistry`] keeps two indices behind one
//! [`parking_lot::RwLock`]:
//!
//! - `buckets`: topic key → sessions subscribed exactly at that key;
//! - `topics`: session id → every key the session occupies, so teardown can
//!   empty all of its buckets in one critical section.
//!
//! # Concurrency
//!
//! Every method takes the lock for a short, synchronous section and never
//! awaits while holding it. Opening and closing a session flip its state
//! inside the write lock, therefore [`SubscriberRegistry::matches`] (read
//! lock) only ever observes `Open` sessions.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::session::{Session, SessionId, SessionState};
use super::TopicKey;

#[derive(Debug, Default)]
struct Index {
    buckets: HashMap<TopicKey, HashMap<SessionId, Arc<Session>>>,
    topics: HashMap<SessionId, HashSet<TopicKey>>,
}

impl Index {
    fn insert(&mut self, topic: TopicKey, session: &Arc<Session>) -> bool {
        let id = session.id();
        let added = self
            .topics
            .entry(id)
            .or_default()
            .insert(topic.clone());
        if added {
            self.buckets
                .entry(topic)
                .or_default()
                .insert(id, Arc::clone(session));
        }
        added
    }

    fn remove(&mut self, topic: &TopicKey, id: SessionId) -> bool {
        let Some(topics) = self.topics.get_mut(&id) else {
            return false;
        };
        if !topics.remove(topic) {
            return false;
        }
        if let Entry::Occupied(mut bucket) = self.buckets.entry(topic.clone()) {
            bucket.get_mut().remove(&id);
            if bucket.get().is_empty() {
                bucket.remove();
            }
        }
        true
    }

    fn remove_session(&mut self, id: SessionId) -> usize {
        let Some(topics) = self.topics.remove(&id) else {
            return 0;
        };
        for topic in &topics {
            if let Some(bucket) = self.buckets.get_mut(topic) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.buckets.remove(topic);
                }
            }
        }
        topics.len()
    }
}

/// Process-wide (but explicitly owned) subscription registry.
///
/// Construct one per server and share it behind an [`Arc`].
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    index: RwLock<Index>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves a freshly accepted session `Connecting → Open` and subscribes
    /// it at its own topic.
    ///
    /// Returns `false` (and registers nothing) if the session was not in
    /// [`SessionState::Connecting`].
    pub fn open(&self, session: &Arc<Session>) -> bool {
        let mut index = self.index.write();
        if !session.transition(SessionState::Connecting, SessionState::Open) {
            return false;
        }
        index.insert(session.topic().clone(), session);
        true
    }

    /// Subscribes an open session at `topic`. Idempotent.
    ///
    /// Returns `true` if the subscription is present afterwards; `false`
    /// if the session is not open.
    pub fn subscribe(&self, topic: TopicKey, session: &Arc<Session>) -> bool {
        let mut index = self.index.write();
        if !session.is_open() {
            return false;
        }
        index.insert(topic, session);
        true
    }

    /// Removes the association between `topic` and the session. No-op if
    /// absent; returns whether something was removed.
    pub fn unsubscribe(&self, topic: &TopicKey, id: SessionId) -> bool {
        self.index.write().remove(topic, id)
    }

    /// Moves the session to [`SessionState::Closing`] and removes it from
    /// every bucket it occupies.
    ///
    /// Idempotent: the first caller performs the transition, later callers
    /// (for example the reader after the writer already failed) get `false`.
    /// A session that never opened is moved to `Closing` as well.
    pub fn close(&self, session: &Session) -> bool {
        let mut index = self.index.write();
        let transitioned = session.transition(SessionState::Open, SessionState::Closing)
            || session.transition(SessionState::Connecting, SessionState::Closing);
        index.remove_session(session.id());
        transitioned
    }

    /// Returns every session subscribed at `topic` or at any of its
    /// ancestors, each session at most once.
    ///
    /// Cost is one bucket lookup per prefix of `topic`, independent of the
    /// total number of subscriptions.
    #[must_use]
    pub fn matches(&self, topic: &TopicKey) -> Vec<Arc<Session>> {
        let index = self.index.read();
        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for prefix in topic.prefixes() {
            let Some(bucket) = index.buckets.get(prefix) else {
                continue;
            };
            for (id, session) in bucket {
                if seen.insert(*id) {
                    matched.push(Arc::clone(session));
                }
            }
        }
        matched
    }

    /// Returns the topics the session is subscribed at.
    #[must_use]
    pub fn topics_of(&self, id: SessionId) -> Vec<TopicKey> {
        let index = self.index.read();
        let mut topics: Vec<TopicKey> = index
            .topics
            .get(&id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    /// Returns `true` if the session is registered (open, possibly with
    /// every topic unsubscribed).
    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.index.read().topics.contains_key(&id)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.index.read().topics.len()
    }

    /// Total number of (topic, session) subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.index.read().topics.values().map(HashSet::len).sum()
    }

    /// Number of topics with at least one subscriber.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.index.read().buckets.len()
    }

    /// Returns `true` if no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().topics.is_empty()
    }
}
