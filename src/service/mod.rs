//! Service layer: business logic orchestration.
//!
//! [`InventoryService`] applies inventory mutations and notifies
//! subscribers through the [`super::domain::Dispatcher`].

pub mod inventory_service;

pub use inventory_service::InventoryService;
