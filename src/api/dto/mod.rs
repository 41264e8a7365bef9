//! Data Transfer Objects for REST request/response serialization.
//!
//! Item bodies are free-form JSON objects; only list envelopes and
//! pagination have fixed shapes.

pub mod common_dto;
pub mod item_dto;

pub use common_dto::*;
pub use item_dto::*;
