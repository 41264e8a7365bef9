//! Lifecycle supervisor for WebSocket sessions.
//!
//! For every upgraded connection the [`Supervisor`]:
//!
//! 1. creates a [`Session`] and opens it in the [`SubscriberRegistry`]
//!    (`Connecting → Open`);
//! 2. spawns a writer task that drains the session's outbound queue into
//!    the socket;
//! 3. runs the read loop in the current task: inbound frames refresh
//!    liveness, text frames are answered (heartbeat or command reply), and
//!    a heartbeat tick enforces the idle timeout and sends pings;
//! 4. on client close, read/write error, idle timeout or server shutdown,
//!    closes the session in the registry (`Open → Closing`), stops the
//!    writer (discarding whatever is still queued) and marks it `Closed`.
//!
//! Both loops may start teardown; [`SubscriberRegistry::close`] is
//! idempotent, so whichever notices first wins.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use super::messages::{ClientCommand, ServerMessage};
use crate::config::SessionSettings;
use crate::domain::{Outbound, Session, SubscriberRegistry, TopicKey};
use crate::error::GatewayError;

/// How long a stopping writer may take to flush its close frame.
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Why a session left the `Open` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent a close frame.
    ClientClosed,
    /// The inbound stream ended without a close frame.
    StreamEnded,
    /// Reading from the transport failed.
    ReadError(String),
    /// Writing to the transport failed.
    WriteError(String),
    /// No inbound activity within the idle timeout.
    IdleTimeout,
    /// The server is shutting down.
    ServerShutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => f.write_str("client closed"),
            Self::StreamEnded => f.write_str("stream ended"),
            Self::ReadError(e) => write!(f, "read error: {e}"),
            Self::WriteError(e) => write!(f, "write error: {e}"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::ServerShutdown => f.write_str("server shutdown"),
        }
    }
}

#[derive(Debug)]
enum WriterExit {
    Stopped,
    QueueClosed,
    Failed(String),
}

/// Drives sessions from accept to teardown.
///
/// Cheap to clone; clones share the registry and the shutdown signal.
#[derive(Debug, Clone)]
pub struct Supervisor {
    registry: Arc<SubscriberRegistry>,
    settings: SessionSettings,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    /// Creates a supervisor. Setting the `shutdown` flag to `true` closes
    /// every running session and refuses new ones.
    #[must_use]
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        settings: SessionSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            settings,
            shutdown,
        }
    }

    /// Returns the registry sessions are opened in.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Returns the session settings.
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Creates a session for `topic` and opens it in the registry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ShuttingDown`] once shutdown was requested;
    /// nothing is registered in that case.
    pub fn accept(
        &self,
        topic: TopicKey,
    ) -> Result<(Arc<Session>, mpsc::Receiver<Outbound>), GatewayError> {
        if self.is_shutting_down() {
            return Err(GatewayError::ShuttingDown);
        }
        let (session, outbound) = Session::new(topic, self.settings.queue_capacity);
        if !self.registry.open(&session) {
            return Err(GatewayError::Internal(format!(
                "session {} could not be opened",
                session.id()
            )));
        }
        tracing::debug!(session = %session.id(), topic = %session.topic(), "session opened");
        Ok((session, outbound))
    }

    /// Closes the session in the registry and marks it `Closed`.
    ///
    /// Safe to call more than once.
    pub fn teardown(&self, session: &Session) {
        self.registry.close(session);
        session.mark_closed();
    }

    /// Runs an upgraded socket subscribed at `topic` until it closes.
    pub async fn run(&self, mut socket: WebSocket, topic: TopicKey) {
        let (session, outbound) = match self.accept(topic) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting websocket session");
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        };

        let reason = self.drive(socket, &session, outbound).await;
        self.teardown(&session);
        tracing::debug!(
            session = %session.id(),
            topic = %session.topic(),
            %reason,
            queued = session.queued_count(),
            dropped = session.dropped_count(),
            "session closed"
        );
    }

    async fn drive(
        &self,
        socket: WebSocket,
        session: &Arc<Session>,
        outbound: mpsc::Receiver<Outbound>,
    ) -> CloseReason {
        let (sink, mut stream) = socket.split();
        let (stop_tx, stop_rx) = oneshot::channel();
        let mut writer = tokio::spawn(write_loop(
            sink,
            outbound,
            stop_rx,
            Arc::clone(session),
            Arc::clone(&self.registry),
        ));
        let mut writer_done = false;

        let heartbeat = ServerMessage::heartbeat().encode().ok();
        let mut ticker = tokio::time::interval(self.settings.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_ping = Instant::now();
        let mut shutdown = self.shutdown.clone();

        let reason = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        session.touch();
                        self.handle_text(session, text.as_str(), heartbeat.as_ref());
                    }
                    Some(Ok(Message::Close(_))) => break CloseReason::ClientClosed,
                    Some(Ok(_)) => session.touch(),
                    Some(Err(e)) => break CloseReason::ReadError(e.to_string()),
                    None => break CloseReason::StreamEnded,
                },
                _ = ticker.tick() => {
                    let idle = session.idle_for();
                    let idle_timeout = self.settings.idle_timeout;
                    if !idle_timeout.is_zero() && idle >= idle_timeout {
                        break CloseReason::IdleTimeout;
                    }
                    let ping_interval = self.settings.ping_interval;
                    if !ping_interval.is_zero()
                        && idle >= ping_interval
                        && last_ping.elapsed() >= ping_interval
                    {
                        last_ping = Instant::now();
                        let _ = session.enqueue(Outbound::Ping);
                    }
                }
                exit = &mut writer => {
                    writer_done = true;
                    break match exit {
                        Ok(WriterExit::Failed(e)) => CloseReason::WriteError(e),
                        Ok(WriterExit::Stopped | WriterExit::QueueClosed) => CloseReason::StreamEnded,
                        Err(e) => CloseReason::WriteError(e.to_string()),
                    };
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break CloseReason::ServerShutdown;
                    }
                }
            }
        };

        // Leave the registry before stopping the writer so the dispatcher
        // stops feeding a queue nobody drains.
        self.registry.close(session);
        if !writer_done {
            let _ = stop_tx.send(());
            if tokio::time::timeout(WRITER_SHUTDOWN_GRACE, &mut writer)
                .await
                .is_err()
            {
                writer.abort();
            }
        }
        reason
    }

    fn handle_text(&self, session: &Arc<Session>, text: &str, heartbeat: Option<&Arc<str>>) {
        let reply = match ClientCommand::parse(text) {
            Some(ClientCommand::Subscribe { topic }) => self.subscribe(session, topic),
            Some(ClientCommand::Unsubscribe { topic }) => {
                self.registry.unsubscribe(&topic, session.id());
                ServerMessage::Unsubscribed { topic }
            }
            None => {
                if let Some(heartbeat) = heartbeat {
                    let _ = session.enqueue(Outbound::Text(Arc::clone(heartbeat)));
                }
                return;
            }
        };
        match reply.encode() {
            Ok(text) => {
                let _ = session.enqueue(Outbound::Text(text));
            }
            Err(e) => tracing::warn!(session = %session.id(), error = %e, "failed to encode reply"),
        }
    }

    fn subscribe(&self, session: &Arc<Session>, topic: TopicKey) -> ServerMessage {
        let current = self.registry.topics_of(session.id());
        if !current.contains(&topic) && current.len() >= self.settings.max_topics_per_session {
            return ServerMessage::error(format!(
                "subscription limit of {} topics reached",
                self.settings.max_topics_per_session
            ));
        }
        if self.registry.subscribe(topic.clone(), session) {
            tracing::debug!(session = %session.id(), %topic, "subscribed");
            ServerMessage::Subscribed { topic }
        } else {
            ServerMessage::error("session is not open")
        }
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    mut stop: oneshot::Receiver<()>,
    session: Arc<Session>,
    registry: Arc<SubscriberRegistry>,
) -> WriterExit {
    let exit = loop {
        tokio::select! {
            biased;
            _ = &mut stop => break WriterExit::Stopped,
            item = outbound.recv() => {
                let Some(item) = item else {
                    break WriterExit::QueueClosed;
                };
                let message = match item {
                    Outbound::Text(text) => Message::text(text.to_string()),
                    Outbound::Ping => Message::Ping(Bytes::new()),
                };
                if let Err(e) = sink.send(message).await {
                    registry.close(&session);
                    tracing::debug!(session = %session.id(), error = %e, "websocket write failed");
                    break WriterExit::Failed(e.to_string());
                }
            }
        }
    };
    if matches!(exit, WriterExit::Stopped) {
        let _ = sink.close().await;
    }
    exit
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::SessionState;

    fn supervisor(settings: SessionSettings) -> (Supervisor, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let registry = Arc::new(SubscriberRegistry::new());
        (Supervisor::new(registry, settings, rx), tx)
    }

    fn next_text(rx: &mut mpsc::Receiver<Outbound>) -> serde_json::Value {
        let Ok(Outbound::Text(text)) = rx.try_recv() else {
            panic!("expected a queued text frame");
        };
        let Ok(value) = serde_json::from_str(&text) else {
            panic!("invalid json");
        };
        value
    }

    #[test]
    fn accept_opens_and_registers() {
        let (sup, _tx) = supervisor(SessionSettings::default());
        let Ok((session, _rx)) = sup.accept(TopicKey::new(["spool"])) else {
            panic!("accept failed");
        };
        assert_eq!(session.state(), SessionState::Open);
        assert!(sup.registry().contains(session.id()));
        assert_eq!(session.capacity(), SessionSettings::default().queue_capacity);
    }

    #[test]
    fn accept_after_shutdown_registers_nothing() {
        let (sup, tx) = supervisor(SessionSettings::default());
        let _ = tx.send(true);
        assert!(sup.is_shutting_down());
        assert!(matches!(
            sup.accept(TopicKey::root()),
            Err(GatewayError::ShuttingDown)
        ));
        assert!(sup.registry().is_empty());
    }

    #[test]
    fn teardown_is_idempotent() {
        let (sup, _tx) = supervisor(SessionSettings::default());
        let Ok((session, _rx)) = sup.accept(TopicKey::root()) else {
            panic!("accept failed");
        };
        sup.teardown(&session);
        sup.teardown(&session);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(sup.registry().is_empty());
    }

    #[test]
    fn plain_text_is_answered_with_heartbeat() {
        let (sup, _tx) = supervisor(SessionSettings::default());
        let Ok((session, mut rx)) = sup.accept(TopicKey::root()) else {
            panic!("accept failed");
        };
        let heartbeat = ServerMessage::heartbeat().encode().ok();
        sup.handle_text(&session, "are you there?", heartbeat.as_ref());
        let reply = next_text(&mut rx);
        assert_eq!(reply.get("status"), Some(&serde_json::json!("healthy")));
        assert_eq!(reply.get("kind"), Some(&serde_json::json!("heartbeat")));
    }

    #[test]
    fn subscribe_and_unsubscribe_commands() {
        let (sup, _tx) = supervisor(SessionSettings::default());
        let Ok((session, mut rx)) = sup.accept(TopicKey::new(["vendor"])) else {
            panic!("accept failed");
        };

        sup.handle_text(
            &session,
            r#"{"command":"subscribe","topic":["spool","1"]}"#,
            None,
        );
        assert_eq!(next_text(&mut rx).get("kind"), Some(&serde_json::json!("subscribed")));
        assert_eq!(sup.registry().topics_of(session.id()).len(), 2);
        assert_eq!(sup.registry().matches(&TopicKey::new(["spool", "1"])).len(), 1);

        sup.handle_text(
            &session,
            r#"{"command":"unsubscribe","topic":["spool","1"]}"#,
            None,
        );
        assert_eq!(next_text(&mut rx).get("kind"), Some(&serde_json::json!("unsubscribed")));
        assert!(sup.registry().matches(&TopicKey::new(["spool", "1"])).is_empty());
    }

    #[test]
    fn subscription_limit_is_enforced() {
        let settings = SessionSettings {
            max_topics_per_session: 2,
            ..SessionSettings::default()
        };
        let (sup, _tx) = supervisor(settings);
        let Ok((session, mut rx)) = sup.accept(TopicKey::root()) else {
            panic!("accept failed");
        };
        sup.handle_text(&session, r#"{"command":"subscribe","topic":["spool"]}"#, None);
        assert_eq!(next_text(&mut rx).get("kind"), Some(&serde_json::json!("subscribed")));

        sup.handle_text(&session, r#"{"command":"subscribe","topic":["vendor"]}"#, None);
        assert_eq!(next_text(&mut rx).get("kind"), Some(&serde_json::json!("error")));

        // Re-subscribing an existing topic is still fine.
        sup.handle_text(&session, r#"{"command":"subscribe","topic":["spool"]}"#, None);
        assert_eq!(next_text(&mut rx).get("kind"), Some(&serde_json::json!("subscribed")));
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(CloseReason::IdleTimeout.to_string(), "idle timeout");
        assert_eq!(
            CloseReason::WriteError("broken pipe".to_string()).to_string(),
            "write error: broken pipe"
        );
    }
}
