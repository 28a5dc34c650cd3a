//! Queued order model

use serde::{Deserialize, Serialize};

use super::Order;

/// An order that failed live transmission and waits in the durable queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOrder {
    /// Store-assigned, monotonically increasing, never reused
    pub sequence_id: i64,
    /// Order exactly as submitted
    pub payload: Order,
    /// Local buffering time (Unix ms), used for replay ordering
    pub enqueued_at: i64,
    /// Always false while resident; the queue purges instead of flagging
    pub synced: bool,
}
