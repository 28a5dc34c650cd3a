//! Messages exchanged between the sync worker and foreground contexts

use serde::{Deserialize, Serialize};

use super::intercept::SubmitOutcome;
use crate::error::{Error, Result};
use crate::models::{Order, OrderId};

/// Envelope for everything that crosses the worker boundary.
///
/// Serialized as `{"type": "...", ...}` so foregrounds in other processes
/// can speak the same protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncMessage {
    /// Worker → foreground: result of one submission
    #[serde(rename_all = "camelCase")]
    SubmitResult {
        order_id: OrderId,
        outcome: SubmitOutcome,
    },
    /// Worker → every foreground: orders recovered from the offline queue,
    /// in replay order
    SyncedOrders { orders: Vec<Order> },
    /// Foreground → worker: reconcile now
    CheckSync,
}

impl SyncMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SubmitResult { .. } => "submit-result",
            Self::SyncedOrders { .. } => "synced-orders",
            Self::CheckSync => "check-sync",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an inbound message, rejecting unknown `type` values
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|error| Error::InvalidInput(format!("unrecognized sync message: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn check_sync_wire_format() {
        let message = SyncMessage::from_json(r#"{"type":"check-sync"}"#).unwrap();
        assert_eq!(message, SyncMessage::CheckSync);
        assert_eq!(message.to_json().unwrap(), r#"{"type":"check-sync"}"#);
    }

    #[test]
    fn synced_orders_carry_full_payloads() {
        let message = SyncMessage::SyncedOrders {
            orders: vec![Order::new(OrderId::new("ord_1").unwrap()).with_detail("total", 900)],
        };

        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "synced-orders", "orders": [{"id": "ord_1", "total": 900}]})
        );
        assert_eq!(message.kind(), "synced-orders");
    }

    #[test]
    fn submit_result_uses_camel_case_fields() {
        let message = SyncMessage::SubmitResult {
            order_id: OrderId::new("ord_9").unwrap(),
            outcome: SubmitOutcome::Delivered,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "submit-result",
                "orderId": "ord_9",
                "outcome": {"status": "delivered"}
            })
        );
    }

    #[test]
    fn unknown_message_types_are_rejected() {
        let error = SyncMessage::from_json(r#"{"type":"format-disk"}"#).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }
}
