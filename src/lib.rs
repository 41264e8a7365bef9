//! # spool-gateway
//!
//! REST API and live WebSocket change notifications for a filament spool
//! inventory (vendors, filaments, spools).
//!
//! Clients open a WebSocket on the same path they would `GET`: the path
//! becomes a [`domain::TopicKey`] and the session receives every change at
//! that topic or below it. `/api/v1/` sees everything, `/api/v1/spool`
//! every spool, `/api/v1/spool/5` only spool 5.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── Basic auth (api/auth)
//!     ├── REST Handlers (api/)      ── WS upgrade (ws/handler)
//!     │                                  │
//!     ├── InventoryService (service/)    ├── Supervisor (ws/supervisor)
//!     │        │                         │     reader / writer / heartbeat
//!     ├── InventoryStore (domain/)       │
//!     │        │ notify                  │ open / close
//!     └── Dispatcher (domain/) ──────► SubscriberRegistry (domain/)
//!                 │ enqueue (drop on full)
//!                 └──► Session outbound queue ──► socket
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
