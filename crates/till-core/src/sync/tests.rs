//! End-to-end scenarios across worker, monitor, and foreground

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use super::*;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{Order, OrderId, QueuedOrder};
use crate::services::DatabaseService;
use crate::state::Connectivity;

/// Transport whose reachability the test flips
#[derive(Default)]
struct Network {
    up: AtomicBool,
}

impl Network {
    fn set(&self, connectivity: Connectivity) {
        self.up.store(connectivity.is_online(), Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderTransport for Network {
    async fn send(&self, _order: &Order) -> Result<Delivery> {
        if self.up.load(Ordering::SeqCst) {
            Ok(Delivery { status: 202 })
        } else {
            Err(Error::Transport("network unreachable".to_string()))
        }
    }
}

/// Store that can no longer write, but still reads what it already has
struct ReadOnlyStore(DatabaseService);

#[async_trait]
impl QueueStore for ReadOnlyStore {
    async fn enqueue(&self, _order: &Order) -> Result<QueuedOrder> {
        Err(Error::Database("storage quota exceeded".to_string()))
    }

    async fn drain_all(&self) -> Result<Vec<QueuedOrder>> {
        self.0.drain_all().await
    }

    async fn purge_all(&self) -> Result<()> {
        self.0.purge_all().await
    }

    async fn purge_through(&self, sequence_id: i64) -> Result<u64> {
        self.0.purge_through(sequence_id).await
    }

    async fn pending_count(&self) -> Result<usize> {
        self.0.pending_count().await
    }
}

struct Register {
    store: Arc<DatabaseService>,
    network: Arc<Network>,
    handle: SyncHandle,
    monitor: ConnectivityMonitor,
    foreground: Foreground,
}

async fn register(initial: Connectivity) -> Register {
    register_with(initial, SyncConfig::default()).await
}

async fn register_with(initial: Connectivity, config: SyncConfig) -> Register {
    let store = Arc::new(DatabaseService::open_in_memory().await.unwrap());
    let network = Arc::new(Network::default());
    network.set(initial);

    let config = config.with_send_timeout(Duration::from_millis(500));
    let handle = SyncWorker::spawn(&config, store.clone(), network.clone());
    let foreground = Foreground::new(
        OrderLedger::new(),
        handle.subscribe(),
        config.notice_duration,
    );
    let monitor = ConnectivityMonitor::new(initial, handle.clone());

    Register {
        store,
        network,
        handle,
        monitor,
        foreground,
    }
}

impl Register {
    fn go(&self, connectivity: Connectivity) {
        self.network.set(connectivity);
        self.monitor.observe(connectivity).unwrap();
    }

    async fn wait_for_empty_queue(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.store.pending_count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("queue was not purged");
    }
}

fn order(id: &str, timestamp: i64) -> Order {
    Order::new(OrderId::new(id).unwrap())
        .with_detail("total", 1500)
        .with_detail("timestamp", timestamp)
}

fn ids<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Vec<&'a str> {
    orders.into_iter().map(|o| o.id.as_str()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_order_reaches_ledger_exactly_once() {
    let mut till = register(Connectivity::Offline).await;

    let outcome = till.handle.submit(order("ord_1", 1)).await;
    assert!(outcome.is_buffered());

    let queued = till.store.drain_all().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].payload.id.as_str(), "ord_1");

    till.go(Connectivity::Online);
    let merged = till.foreground.next_merge().await.unwrap();
    till.wait_for_empty_queue().await;

    assert_eq!(ids(&merged), vec!["ord_1"]);
    assert_eq!(ids(till.foreground.ledger().orders()), vec!["ord_1"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn broadcast_preserves_enqueue_order() {
    let mut till = register(Connectivity::Offline).await;

    assert!(till.handle.submit(order("ord_1", 1)).await.is_buffered());
    assert!(till.handle.submit(order("ord_2", 2)).await.is_buffered());

    till.go(Connectivity::Online);
    let merged = till.foreground.next_merge().await.unwrap();

    assert_eq!(ids(&merged), vec!["ord_1", "ord_2"]);
    assert_eq!(
        ids(till.foreground.ledger().newest_first()),
        vec!["ord_2", "ord_1"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_broadcast_leaves_ledger_size_unchanged() {
    let mut till = register(Connectivity::Offline).await;
    till.foreground.ledger_mut().merge(&[order("ord_1", 1)]);

    assert!(till.handle.submit(order("ord_1", 1)).await.is_buffered());
    assert!(till.handle.submit(order("ord_3", 3)).await.is_buffered());
    till.go(Connectivity::Online);

    let merged = till.foreground.next_merge().await.unwrap();
    assert_eq!(ids(&merged), vec!["ord_3"]);
    assert_eq!(till.foreground.ledger().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn live_submission_never_enters_the_queue() {
    let till = register(Connectivity::Online).await;

    let outcome = till.handle.submit(order("ord_live", 1)).await;

    assert_eq!(outcome, SubmitOutcome::Delivered);
    assert_eq!(till.store.pending_count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn steady_online_signal_does_not_reconcile() {
    let till = register(Connectivity::Offline).await;
    assert!(till.handle.submit(order("ord_1", 1)).await.is_buffered());

    // Network returns without the monitor seeing an edge
    till.network.set(Connectivity::Online);
    till.monitor.observe(Connectivity::Offline).unwrap();
    assert_eq!(
        till.monitor.observe(Connectivity::Offline).unwrap(),
        Transition::Unchanged
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(till.store.pending_count().await.unwrap(), 1);

    // An explicit check-sync still drains it
    let report = till.handle.check_sync_and_wait().await.unwrap();
    assert_eq!(
        report,
        ReconcileReport::Broadcast {
            orders: 1,
            listeners: 1,
            purged: 1
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn every_foreground_receives_the_broadcast() {
    let mut till = register(Connectivity::Offline).await;
    let mut second = Foreground::new(
        OrderLedger::new(),
        till.handle.subscribe(),
        Duration::from_secs(2),
    );

    assert!(till.handle.submit(order("ord_1", 1)).await.is_buffered());
    till.go(Connectivity::Online);

    let first = till.foreground.next_merge().await.unwrap();
    let other = second.next_merge().await.unwrap();
    assert_eq!(first, other);
}

#[tokio::test(flavor = "multi_thread")]
async fn storage_failure_is_lost_and_leaves_queue_unchanged() {
    let backing = DatabaseService::open_in_memory().await.unwrap();
    backing.enqueue(&order("ord_earlier", 1)).await.unwrap();
    let before = backing.drain_all().await.unwrap();

    let store = Arc::new(ReadOnlyStore(backing.clone()));
    let network = Arc::new(Network::default());
    let handle = SyncWorker::spawn(&SyncConfig::default(), store, network);

    let outcome = handle.submit(order("ord_1", 2)).await;

    assert!(outcome.is_lost());
    assert_eq!(backing.drain_all().await.unwrap(), before);
}

#[tokio::test(flavor = "multi_thread")]
async fn busy_submit_traffic_does_not_crowd_out_synced_orders() {
    let config = SyncConfig {
        event_capacity: 2,
        ..SyncConfig::default()
    };
    let mut till = register_with(Connectivity::Offline, config).await;
    let mut results = till.handle.submit_results();

    assert!(till.handle.submit(order("ord_1", 1)).await.is_buffered());
    till.network.set(Connectivity::Online);
    assert_eq!(
        till.handle.check_sync_and_wait().await.unwrap(),
        ReconcileReport::Broadcast {
            orders: 1,
            listeners: 1,
            purged: 1
        }
    );

    for index in 2..=4 {
        let outcome = till.handle.submit(order(&format!("ord_{index}"), index)).await;
        assert_eq!(outcome, SubmitOutcome::Delivered);
    }

    let merged = till.foreground.apply_pending();
    assert_eq!(ids(&merged), vec!["ord_1"]);
    assert_eq!(ids(till.foreground.ledger().orders()), vec!["ord_1"]);
    assert_eq!(till.store.pending_count().await.unwrap(), 0);

    // Submit results beyond the capacity are skipped, not queued forever
    assert!(matches!(
        results.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_foreground_receives_every_sync_cycle() {
    let config = SyncConfig {
        event_capacity: 1,
        ..SyncConfig::default()
    };
    let mut till = register_with(Connectivity::Offline, config).await;

    for index in 1..=3 {
        till.network.set(Connectivity::Offline);
        let id = format!("ord_{index}");
        assert!(till.handle.submit(order(&id, index)).await.is_buffered());
        till.network.set(Connectivity::Online);
        till.handle.check_sync_and_wait().await.unwrap();
    }

    let merged = till.foreground.apply_pending();
    assert_eq!(ids(&merged), vec!["ord_1", "ord_2", "ord_3"]);
    assert_eq!(till.foreground.ledger().len(), 3);
}
