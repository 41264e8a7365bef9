//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::GatewayConfig;
use crate::domain::{Dispatcher, InventoryStore, SubscriberRegistry};
use crate::service::InventoryService;
use crate::ws::Supervisor;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Inventory service for all data-layer operations.
    pub inventory: Arc<InventoryService>,
    /// Dispatcher fanning changes out to sessions.
    pub dispatcher: Dispatcher,
    /// Supervisor running WebSocket sessions.
    pub supervisor: Supervisor,
    /// Loaded configuration.
    pub config: Arc<GatewayConfig>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Wires registry, dispatcher, store, service and supervisor together.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        let inventory = Arc::new(InventoryService::new(
            Arc::new(InventoryStore::new()),
            dispatcher.clone(),
        ));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let supervisor = Supervisor::new(registry, config.session.clone(), shutdown_rx);

        Self {
            inventory,
            dispatcher,
            supervisor,
            config: Arc::new(config),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Returns the subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        self.dispatcher.registry()
    }

    /// Closes every live session and refuses new ones.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::info!(
            sessions = self.registry().session_count(),
            "closing websocket sessions"
        );
    }
}
