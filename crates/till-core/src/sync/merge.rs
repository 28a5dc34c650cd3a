//! Foreground-side merge of synced orders into the canonical ledger

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::fanout::SyncedOrdersReceiver;
use super::message::SyncMessage;
use crate::models::{Order, OrderId};

/// The foreground's single source of truth for known orders.
///
/// Front of the list is the most recently merged block. Only the foreground
/// mutates it, either through [`OrderLedger::merge`] or by recording an
/// order it delivered itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderLedger {
    orders: Vec<Order>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted orders, front first. Later duplicates are dropped.
    pub fn from_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut seen = HashSet::new();
        let orders = orders
            .into_iter()
            .filter(|order| seen.insert(order.id.clone()))
            .collect();
        Self { orders }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.iter().any(|order| &order.id == id)
    }

    /// Record an order created and delivered by this foreground.
    /// Returns `false` when the id is already known.
    pub fn record_local(&mut self, order: Order) -> bool {
        if self.contains(&order.id) {
            return false;
        }
        self.orders.insert(0, order);
        true
    }

    /// Prepend the orders whose ids are not yet known, keeping their
    /// relative order. Returns exactly the orders that were added.
    pub fn merge(&mut self, incoming: &[Order]) -> Vec<Order> {
        let mut known: HashSet<OrderId> =
            self.orders.iter().map(|order| order.id.clone()).collect();
        let fresh: Vec<Order> = incoming
            .iter()
            .filter(|order| known.insert(order.id.clone()))
            .cloned()
            .collect();

        if !fresh.is_empty() {
            self.orders.splice(0..0, fresh.iter().cloned());
        }
        fresh
    }

    /// Display projection: newest order timestamp first. Orders without a
    /// readable timestamp go last, keeping ledger order among equals.
    pub fn newest_first(&self) -> Vec<&Order> {
        let mut view: Vec<&Order> = self.orders.iter().collect();
        view.sort_by_key(|order| std::cmp::Reverse(order.timestamp_millis()));
        view
    }
}

/// Transient "N orders synchronized" indication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncNotice {
    pub count: usize,
}

impl fmt::Display for SyncNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            1 => f.write_str("1 order synchronized"),
            count => write!(f, "{count} orders synchronized"),
        }
    }
}

/// One foreground instance: owns a ledger and listens to worker broadcasts
pub struct Foreground {
    ledger: OrderLedger,
    events: SyncedOrdersReceiver,
    notice: watch::Sender<Option<SyncNotice>>,
    notice_duration: Duration,
}

impl Foreground {
    pub fn new(
        ledger: OrderLedger,
        events: SyncedOrdersReceiver,
        notice_duration: Duration,
    ) -> Self {
        let (notice, _) = watch::channel(None);
        Self {
            ledger,
            events,
            notice,
            notice_duration,
        }
    }

    pub const fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut OrderLedger {
        &mut self.ledger
    }

    /// Current and future notices; `None` means nothing is shown
    pub fn notices(&self) -> watch::Receiver<Option<SyncNotice>> {
        self.notice.subscribe()
    }

    /// Handle one message. Returns the newly merged orders, empty for
    /// messages that do not touch the ledger.
    ///
    /// Must run inside a Tokio runtime; the notice timer is a spawned task.
    pub fn apply(&mut self, message: SyncMessage) -> Vec<Order> {
        let SyncMessage::SyncedOrders { orders } = message else {
            return Vec::new();
        };

        let merged = self.ledger.merge(&orders);
        tracing::debug!(
            received = orders.len(),
            merged = merged.len(),
            "Merged synced orders into ledger"
        );
        if !merged.is_empty() {
            self.announce(SyncNotice {
                count: merged.len(),
            });
        }
        merged
    }

    /// Wait for the next broadcast that merges at least one order.
    ///
    /// Returns `None` once the worker is gone.
    pub async fn next_merge(&mut self) -> Option<Vec<Order>> {
        while let Some(message) = self.events.recv().await {
            let merged = self.apply(message);
            if !merged.is_empty() {
                return Some(merged);
            }
        }
        None
    }

    /// Apply every broadcast already waiting, without blocking.
    ///
    /// Short-lived foregrounds call this after a `check_sync_and_wait`.
    pub fn apply_pending(&mut self) -> Vec<Order> {
        let mut merged = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(message) => merged.extend(self.apply(message)),
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    return merged;
                }
            }
        }
    }

    /// Show the notice and clear it after the configured delay. Each timer
    /// runs on its own; a later merge does not extend an earlier one.
    fn announce(&self, notice: SyncNotice) {
        tracing::info!("{notice}");
        self.notice.send_replace(Some(notice));

        let sender = self.notice.clone();
        let delay = self.notice_duration;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sender.send_replace(None);
        });
    }
}
