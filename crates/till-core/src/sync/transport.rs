//! Live order transmission

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::Order;
use crate::util::{compact_text, is_http_url};

/// Proof that the endpoint answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub status: u16,
}

/// Sends one order to the order-sync endpoint.
///
/// `Err` means no response was obtained (no route, DNS, refused, timeout).
/// Any response, whatever its status or body, is a delivery.
#[async_trait]
pub trait OrderTransport: Send + Sync {
    async fn send(&self, order: &Order) -> Result<Delivery>;
}

/// `POST`s order JSON over HTTP
#[derive(Clone)]
pub struct HttpOrderTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpOrderTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into().trim().trim_end_matches('/').to_string();
        if !is_http_url(&endpoint) {
            return Err(Error::Config(
                "order endpoint must include http:// or https://".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OrderTransport for HttpOrderTransport {
    async fn send(&self, order: &Order) -> Result<Delivery> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(order)
            .send()
            .await
            .map_err(|error| Error::Transport(describe_send_error(&error)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                order_id = %order.id,
                status = status.as_u16(),
                body = %compact_text(&body),
                "Order endpoint answered with a non-success status"
            );
        }

        Ok(Delivery {
            status: status.as_u16(),
        })
    }
}

fn describe_send_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("could not connect: {error}")
    } else {
        error.to_string()
    }
}
