//! One accepted client connection, independent of the transport.
//!
//! A [`Session`] owns the sending half of a bounded outbound queue. The
//! dispatcher pushes into it with [`Session::enqueue`], which never waits:
//! when the queue is full the message is dropped so that one slow client
//! cannot hold up delivery to the others. The receiving half is drained by
//! the writer task of the [`crate::ws::Supervisor`].
//!
//! State moves strictly forward through
//! `Connecting → Open → Closing → Closed`. The transitions into and out of
//! `Open` are driven by the [`super::SubscriberRegistry`] under its write
//! lock, so a session is visible to lookups exactly while it is `Open`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;

use super::TopicKey;

/// Unique identifier of a connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    /// Transport accepted, not yet registered.
    Connecting = 0,
    /// Registered and receiving events.
    Open = 1,
    /// Teardown in progress; no longer registered.
    Closing = 2,
    /// Terminal.
    Closed = 3,
}

impl SessionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Item on a session's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Pre-serialized JSON text frame, shared between all recipients.
    Text(Arc<str>),
    /// Transport-level ping soliciting a pong.
    Ping,
}

/// Result of [`Session::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The message is on the queue.
    Queued,
    /// The queue was full; the message was discarded.
    Dropped,
    /// The session is not open (or its writer is gone).
    Closed,
}

impl EnqueueOutcome {
    /// Returns `true` if the message was queued.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// A single client connection as seen by the notification core.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    topic: TopicKey,
    state: AtomicU8,
    outbound: mpsc::Sender<Outbound>,
    capacity: usize,
    started: Instant,
    /// Milliseconds since `started` of the last inbound frame.
    last_activity_ms: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
}

impl Session {
    /// Creates a session in state [`SessionState::Connecting`] together with
    /// the receiving half of its outbound queue.
    ///
    /// `topic` is the subscription derived from the request path. A
    /// `capacity` of zero is raised to one.
    #[must_use]
    pub fn new(topic: TopicKey, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let capacity = capacity.max(1);
        let (outbound, rx) = mpsc::channel(capacity);
        let session = Self {
            id: SessionId::new(),
            topic,
            state: AtomicU8::new(SessionState::Connecting as u8),
            outbound,
            capacity,
            started: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (Arc::new(session), rx)
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the topic the session was opened with.
    #[must_use]
    pub const fn topic(&self) -> &TopicKey {
        &self.topic
    }

    /// Returns the outbound queue capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while the session is [`SessionState::Open`].
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Attempts to place `message` on the outbound queue without waiting.
    pub fn enqueue(&self, message: Outbound) -> EnqueueOutcome {
        if !self.is_open() {
            return EnqueueOutcome::Closed;
        }
        match self.outbound.try_send(message) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                EnqueueOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                EnqueueOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Records inbound activity from the client.
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_activity_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the last inbound activity (or since creation).
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    /// Number of messages successfully queued.
    #[must_use]
    pub fn queued_count(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Number of messages discarded because the queue was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Atomically moves from `from` to `to`. Returns `false` if the session
    /// was not in `from`.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Finishes teardown. Only valid from [`SessionState::Closing`].
    pub fn mark_closed(&self) -> bool {
        self.transition(SessionState::Closing, SessionState::Closed)
    }
}
