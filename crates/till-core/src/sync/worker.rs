//! Background sync context and the handle foregrounds talk to

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use super::fanout::{Fanout, SyncedOrdersReceiver};
use super::intercept::{Interceptor, SubmitOutcome};
use super::message::SyncMessage;
use super::queue::QueueStore;
use super::reconcile::{ReconcileReport, Reconciler};
use super::transport::{HttpOrderTransport, OrderTransport};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::Order;

enum WorkerCommand {
    Submit {
        order: Order,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    CheckSync {
        reply: Option<oneshot::Sender<Result<ReconcileReport>>>,
    },
}

/// Cheap, cloneable connection to a running [`SyncWorker`]
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    results: broadcast::Sender<SyncMessage>,
    synced: Fanout,
}

impl SyncHandle {
    /// Submit an order through the interception layer.
    ///
    /// If the worker has shut down the order is reported `Lost`.
    pub async fn submit(&self, order: Order) -> SubmitOutcome {
        let order_id = order.id.clone();
        let (reply, outcome) = oneshot::channel();
        if self
            .commands
            .send(WorkerCommand::Submit { order, reply })
            .is_err()
        {
            return worker_gone(&order_id);
        }
        outcome.await.unwrap_or_else(|_| worker_gone(&order_id))
    }

    /// Ask for a reconciliation without waiting for it
    pub fn check_sync(&self) -> Result<()> {
        self.commands
            .send(WorkerCommand::CheckSync { reply: None })
            .map_err(|_| Error::WorkerUnavailable("sync worker has shut down".to_string()))
    }

    /// Ask for a reconciliation and wait for its report
    pub async fn check_sync_and_wait(&self) -> Result<ReconcileReport> {
        let (reply, report) = oneshot::channel();
        self.commands
            .send(WorkerCommand::CheckSync { reply: Some(reply) })
            .map_err(|_| Error::WorkerUnavailable("sync worker has shut down".to_string()))?;
        report
            .await
            .map_err(|_| Error::WorkerUnavailable("sync worker dropped the request".to_string()))?
    }

    /// Deliver a foreground message to the worker.
    ///
    /// Foregrounds may only send `check-sync`; the other kinds flow from the
    /// worker outward.
    pub fn post(&self, message: SyncMessage) -> Result<()> {
        match message {
            SyncMessage::CheckSync => self.check_sync(),
            other => Err(Error::InvalidInput(format!(
                "foregrounds cannot send '{}' messages",
                other.kind()
            ))),
        }
    }

    /// [`Self::post`] for a raw JSON message
    pub fn post_json(&self, payload: &str) -> Result<()> {
        self.post(SyncMessage::from_json(payload)?)
    }

    /// Attach a foreground. Every `synced-orders` broadcast from now on is
    /// held for it until read.
    pub fn subscribe(&self) -> SyncedOrdersReceiver {
        self.synced.subscribe()
    }

    /// Follow `submit-result` notifications. These are informational: a
    /// receiver that falls more than the event capacity behind skips the
    /// oldest, and the submitter always gets its outcome from [`Self::submit`].
    pub fn submit_results(&self) -> broadcast::Receiver<SyncMessage> {
        self.results.subscribe()
    }
}

fn worker_gone(order_id: &crate::models::OrderId) -> SubmitOutcome {
    tracing::error!(order_id = %order_id, "Sync worker unavailable, order not recorded");
    SubmitOutcome::Lost {
        error: "sync worker has shut down".to_string(),
    }
}

/// Owns the interception layer and the reconciler.
///
/// Every command runs as its own task, so a slow transmission never holds
/// up a check-sync request or another submission.
pub struct SyncWorker {
    interceptor: Interceptor,
    reconciler: Arc<Reconciler>,
    results: broadcast::Sender<SyncMessage>,
}

impl SyncWorker {
    /// Start the worker on the current Tokio runtime
    pub fn spawn(
        config: &SyncConfig,
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn OrderTransport>,
    ) -> SyncHandle {
        let (results, _) = broadcast::channel(config.event_capacity.max(1));
        let synced = Fanout::new();
        let (commands, receiver) = mpsc::unbounded_channel();

        let worker = Self {
            interceptor: Interceptor::new(transport, Arc::clone(&store), config.send_timeout),
            reconciler: Arc::new(Reconciler::new(store, synced.clone(), config.purge_policy)),
            results: results.clone(),
        };
        tokio::spawn(worker.run(receiver));
        tracing::debug!(
            policy = %config.purge_policy,
            timeout_ms = config.send_timeout.as_millis(),
            "Sync worker started"
        );

        SyncHandle {
            commands,
            results,
            synced,
        }
    }

    /// Start the worker with an HTTP transport to the configured endpoint
    pub fn spawn_http(config: &SyncConfig, store: Arc<dyn QueueStore>) -> Result<SyncHandle> {
        let transport = HttpOrderTransport::new(&config.order_endpoint, config.send_timeout)?;
        Ok(Self::spawn(config, store, Arc::new(transport)))
    }

    async fn run(self, mut commands: mpsc::UnboundedReceiver<WorkerCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                WorkerCommand::Submit { order, reply } => {
                    let interceptor = self.interceptor.clone();
                    let results = self.results.clone();
                    tokio::spawn(async move {
                        let outcome = interceptor.submit(&order).await;
                        let _ = results.send(SyncMessage::SubmitResult {
                            order_id: order.id,
                            outcome: outcome.clone(),
                        });
                        let _ = reply.send(outcome);
                    });
                }
                WorkerCommand::CheckSync { reply } => {
                    let reconciler = Arc::clone(&self.reconciler);
                    tokio::spawn(async move {
                        let result = reconciler.reconcile().await;
                        if let Err(error) = &result {
                            tracing::error!("Reconciliation failed: {error}");
                        }
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    });
                }
            }
        }
        tracing::debug!("Sync worker stopped: all handles dropped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::OrderId;
    use crate::services::DatabaseService;
    use crate::sync::transport::Delivery;

    struct Unreachable;

    #[async_trait]
    impl OrderTransport for Unreachable {
        async fn send(&self, _order: &Order) -> Result<Delivery> {
            Err(Error::Transport("network unreachable".to_string()))
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::default().with_send_timeout(Duration::from_millis(200))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_result_is_broadcast() {
        let store = Arc::new(DatabaseService::open_in_memory().await.unwrap());
        let handle = SyncWorker::spawn(&config(), store, Arc::new(Unreachable));
        let mut events = handle.submit_results();

        let order = Order::new(OrderId::new("ord_1").unwrap());
        let outcome = handle.submit(order).await;
        assert!(outcome.is_buffered());

        let message = events.recv().await.unwrap();
        assert_eq!(
            message,
            SyncMessage::SubmitResult {
                order_id: OrderId::new("ord_1").unwrap(),
                outcome,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn check_sync_on_empty_queue_is_a_no_op() {
        let store = Arc::new(DatabaseService::open_in_memory().await.unwrap());
        let handle = SyncWorker::spawn(&config(), store, Arc::new(Unreachable));

        assert_eq!(handle.check_sync_and_wait().await.unwrap(), ReconcileReport::Empty);
        assert_eq!(handle.check_sync_and_wait().await.unwrap(), ReconcileReport::Empty);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn post_accepts_only_check_sync() {
        let store = Arc::new(DatabaseService::open_in_memory().await.unwrap());
        let handle = SyncWorker::spawn(&config(), store, Arc::new(Unreachable));

        handle.post_json(r#"{"type":"check-sync"}"#).unwrap();
        let error = handle
            .post(SyncMessage::SyncedOrders { orders: Vec::new() })
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(handle.post_json(r#"{"type":"purge-everything"}"#).is_err());
    }

    #[test]
    fn handle_reports_stopped_worker() {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (results, _) = broadcast::channel(1);
        drop(receiver);
        let handle = SyncHandle {
            commands,
            results,
            synced: Fanout::new(),
        };

        assert!(matches!(
            handle.check_sync(),
            Err(Error::WorkerUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn submit_to_stopped_worker_is_lost() {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (results, _) = broadcast::channel(1);
        drop(receiver);
        let handle = SyncHandle {
            commands,
            results,
            synced: Fanout::new(),
        };

        let outcome = handle.submit(Order::new(OrderId::new("ord_1").unwrap())).await;
        assert!(outcome.is_lost());
    }
}
