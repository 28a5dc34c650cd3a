//! Durable queue store contract

use async_trait::async_trait;

use crate::models::{Order, QueuedOrder};
use crate::services::DatabaseService;
use crate::Result;

/// Crash-surviving storage for orders that could not be sent live.
///
/// Implementations must serialize calls: an `enqueue` racing a `drain_all`
/// lands entirely before or entirely after the snapshot.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append an order with a fresh sequence id and the current time
    async fn enqueue(&self, order: &Order) -> Result<QueuedOrder>;

    /// Snapshot of every resident entry, ascending by sequence id
    async fn drain_all(&self) -> Result<Vec<QueuedOrder>>;

    /// Empty the store. Purging an empty store is a no-op.
    async fn purge_all(&self) -> Result<()>;

    /// Remove entries with a sequence id up to and including `sequence_id`
    async fn purge_through(&self, sequence_id: i64) -> Result<u64>;

    /// Number of resident entries
    async fn pending_count(&self) -> Result<usize>;
}

#[async_trait]
impl QueueStore for DatabaseService {
    async fn enqueue(&self, order: &Order) -> Result<QueuedOrder> {
        let queued = self.enqueue_order(order).await?;
        tracing::debug!(
            order_id = %order.id,
            sequence_id = queued.sequence_id,
            "Buffered order in offline queue"
        );
        Ok(queued)
    }

    async fn drain_all(&self) -> Result<Vec<QueuedOrder>> {
        self.queued_orders().await
    }

    async fn purge_all(&self) -> Result<()> {
        let removed = self.purge_queue().await?;
        tracing::debug!(removed, "Purged offline queue");
        Ok(())
    }

    async fn purge_through(&self, sequence_id: i64) -> Result<u64> {
        self.purge_queue_through(sequence_id).await
    }

    async fn pending_count(&self) -> Result<usize> {
        self.queued_count().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::models::OrderId;
    use pretty_assertions::assert_eq;

    fn order(id: &str) -> Order {
        Order::new(OrderId::new(id).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_is_ordered_by_sequence() {
        let store = DatabaseService::open_in_memory().await.unwrap();
        for id in ["ord_1", "ord_2", "ord_3"] {
            store.enqueue(&order(id)).await.unwrap();
        }

        let drained = store.drain_all().await.unwrap();
        let ids: Vec<&str> = drained.iter().map(|q| q.payload.id.as_str()).collect();
        assert_eq!(ids, vec!["ord_1", "ord_2", "ord_3"]);
        assert!(drained
            .windows(2)
            .all(|pair| pair[0].sequence_id < pair[1].sequence_id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_does_not_consume() {
        let store = DatabaseService::open_in_memory().await.unwrap();
        store.enqueue(&order("ord_1")).await.unwrap();

        assert_eq!(store.drain_all().await.unwrap().len(), 1);
        assert_eq!(store.drain_all().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_all_is_idempotent() {
        let store = DatabaseService::open_in_memory().await.unwrap();
        store.purge_all().await.unwrap();

        store.enqueue(&order("ord_1")).await.unwrap();
        store.purge_all().await.unwrap();
        store.purge_all().await.unwrap();

        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_enqueues_are_never_torn_by_a_drain() {
        let store = Arc::new(DatabaseService::open_in_memory().await.unwrap());

        let writers: Vec<_> = (0..20)
            .map(|index| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.enqueue(&order(&format!("ord_{index}"))).await.unwrap();
                })
            })
            .collect();

        let snapshot = store.drain_all().await.unwrap();
        let high_water = snapshot.iter().map(|q| q.sequence_id).max();

        for writer in writers {
            writer.await.unwrap();
        }

        if let Some(high_water) = high_water {
            store.purge_through(high_water).await.unwrap();
        }
        let rest = store.drain_all().await.unwrap();

        let mut seen = HashSet::new();
        for queued in snapshot.iter().chain(rest.iter()) {
            assert!(seen.insert(queued.payload.id.clone()), "order seen twice");
        }
        assert_eq!(seen.len(), 20);
    }
}
