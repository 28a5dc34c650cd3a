//! Queue reconciliation: drain, broadcast, purge

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use super::fanout::Fanout;
use super::message::SyncMessage;
use super::queue::QueueStore;
use crate::error::{Error, Result};
use crate::models::{Order, QueuedOrder};

/// What to do with drained orders when no foreground received the broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PurgePolicy {
    /// Purge even when the broadcast reached nobody
    #[default]
    AfterBroadcast,
    /// Keep the queue intact until at least one foreground is attached
    RequireListener,
}

impl PurgePolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AfterBroadcast => "after-broadcast",
            Self::RequireListener => "require-listener",
        }
    }
}

impl fmt::Display for PurgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurgePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "after-broadcast" => Ok(Self::AfterBroadcast),
            "require-listener" => Ok(Self::RequireListener),
            other => Err(Error::Config(format!(
                "unknown purge policy '{other}' (expected after-broadcast or require-listener)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Draining,
}

/// Result of one reconciliation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileReport {
    /// Another cycle was already draining
    Skipped,
    /// Nothing was queued
    Empty,
    /// Orders were broadcast and purged
    Broadcast {
        orders: usize,
        listeners: usize,
        purged: u64,
    },
    /// Nobody was listening and the policy kept the queue
    Retained { orders: usize },
}

/// Sort drained entries into replay order: oldest enqueue time first, ties
/// broken by sequence id
pub fn replay_order(mut entries: Vec<QueuedOrder>) -> Vec<QueuedOrder> {
    entries.sort_by_key(|entry| (entry.enqueued_at, entry.sequence_id));
    entries
}

/// Replays the offline queue to every attached foreground.
///
/// At most one cycle runs at a time; overlapping requests are skipped rather
/// than queued.
pub struct Reconciler {
    store: Arc<dyn QueueStore>,
    listeners: Fanout,
    policy: PurgePolicy,
    draining: AtomicBool,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn QueueStore>,
        listeners: Fanout,
        policy: PurgePolicy,
    ) -> Self {
        Self {
            store,
            listeners,
            policy,
            draining: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ReconcileState {
        if self.draining.load(Ordering::Acquire) {
            ReconcileState::Draining
        } else {
            ReconcileState::Idle
        }
    }

    pub const fn policy(&self) -> PurgePolicy {
        self.policy
    }

    /// Run one reconciliation cycle.
    ///
    /// On a storage error the queue is left as it was and the guard is
    /// released so a later request can retry. A failed purge means the next
    /// cycle broadcasts the same orders again; merging is idempotent.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("Reconciliation already in progress, skipping");
            return Ok(ReconcileReport::Skipped);
        };

        let entries = self.store.drain_all().await?;
        if entries.is_empty() {
            tracing::debug!("Offline queue is empty, nothing to reconcile");
            return Ok(ReconcileReport::Empty);
        }

        let entries = replay_order(entries);
        let high_water = entries
            .iter()
            .map(|entry| entry.sequence_id)
            .max()
            .unwrap_or_default();
        let orders: Vec<Order> = entries.into_iter().map(|entry| entry.payload).collect();
        let count = orders.len();

        let listeners = self.listeners.send(&SyncMessage::SyncedOrders { orders });

        if listeners == 0 {
            match self.policy {
                PurgePolicy::RequireListener => {
                    tracing::info!(
                        orders = count,
                        "No foreground attached, keeping offline queue for a later sync"
                    );
                    return Ok(ReconcileReport::Retained { orders: count });
                }
                PurgePolicy::AfterBroadcast => {
                    tracing::warn!(
                        orders = count,
                        "No foreground received synced orders; purging them anyway"
                    );
                }
            }
        }

        let purged = self.store.purge_through(high_water).await?;
        tracing::info!(orders = count, listeners, purged, "Offline queue reconciled");

        Ok(ReconcileReport::Broadcast {
            orders: count,
            listeners,
            purged,
        })
    }
}

/// Holds the draining flag; dropping it returns the reconciler to idle
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
