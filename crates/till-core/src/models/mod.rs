//! Data models for Till

mod order;
mod queued_order;

pub use order::{Order, OrderDraft, OrderId, OrderItem};
pub use queued_order::QueuedOrder;
