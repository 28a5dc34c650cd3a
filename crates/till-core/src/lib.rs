//! till-core - Core library for Till
//!
//! This crate contains the order models, the libSQL database layer, and the
//! offline-resilient submission pipeline shared by the Till CLI and services:
//! durable queue, interception layer, connectivity monitor, reconciliation,
//! and ledger merge.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Order, OrderDraft, OrderId, OrderItem, QueuedOrder};
pub use state::Connectivity;
