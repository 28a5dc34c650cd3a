//! Interception layer between the register and the network

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::queue::QueueStore;
use super::transport::OrderTransport;
use crate::models::Order;

/// What became of one submission.
///
/// Submission never fails outright: the caller learns whether the order went
/// out live, was buffered for later, or is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SubmitOutcome {
    /// The endpoint answered
    Delivered,
    /// Persisted to the offline queue
    Buffered {
        #[serde(rename = "sequenceId")]
        sequence_id: i64,
    },
    /// Neither transmission nor storage succeeded
    Lost { error: String },
}

impl SubmitOutcome {
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub const fn is_buffered(&self) -> bool {
        matches!(self, Self::Buffered { .. })
    }

    pub const fn is_lost(&self) -> bool {
        matches!(self, Self::Lost { .. })
    }
}

/// Tries live transmission and falls back to the durable queue
#[derive(Clone)]
pub struct Interceptor {
    transport: Arc<dyn OrderTransport>,
    store: Arc<dyn QueueStore>,
    send_timeout: Duration,
}

impl Interceptor {
    pub fn new(
        transport: Arc<dyn OrderTransport>,
        store: Arc<dyn QueueStore>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            send_timeout,
        }
    }

    /// Submit one order.
    ///
    /// Each call is independent; concurrent submissions may interleave.
    pub async fn submit(&self, order: &Order) -> SubmitOutcome {
        let failure = match tokio::time::timeout(self.send_timeout, self.transport.send(order)).await
        {
            Ok(Ok(delivery)) => {
                tracing::debug!(
                    order_id = %order.id,
                    status = delivery.status,
                    "Order delivered live"
                );
                return SubmitOutcome::Delivered;
            }
            Ok(Err(error)) => error.to_string(),
            Err(_) => format!(
                "no response within {} ms",
                self.send_timeout.as_millis()
            ),
        };

        tracing::info!(
            order_id = %order.id,
            reason = %failure,
            "Order transmission failed, buffering offline"
        );

        match self.store.enqueue(order).await {
            Ok(queued) => SubmitOutcome::Buffered {
                sequence_id: queued.sequence_id,
            },
            Err(error) => {
                tracing::error!(
                    order_id = %order.id,
                    transmit_error = %failure,
                    storage_error = %error,
                    "Order could not be sent or buffered"
                );
                SubmitOutcome::Lost {
                    error: format!("send failed ({failure}); buffering failed ({error})"),
                }
            }
        }
    }
}
