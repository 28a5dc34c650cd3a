//! Order model
//!
//! The sync pipeline only relies on [`Order::id`]. Every other field is kept
//! as an opaque JSON object so orders round-trip exactly as the register
//! produced them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Globally unique order identifier assigned by the register at creation time.
///
/// This is the idempotence key for ledger merges. Empty ids are rejected on
/// construction and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    /// Create a fresh id (`ord_` + time-sortable UUID v7)
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ord_{}", Uuid::now_v7().simple()))
    }

    /// Wrap an externally assigned id, kept exactly as given
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::InvalidInput("order id must not be empty".to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<OrderId> for String {
    fn from(value: OrderId) -> Self {
        value.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// An order as produced by the register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Idempotence key
    pub id: OrderId,
    /// Items, totals, status, payment status, timestamp, author, ...
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Order {
    /// Create an order with no details
    #[must_use]
    pub fn new(id: OrderId) -> Self {
        Self {
            id,
            details: Map::new(),
        }
    }

    /// Set a detail field, replacing any previous value
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// Creation time in Unix ms, read from the `timestamp` detail.
    ///
    /// Accepts either a numeric millisecond value or an RFC 3339 string.
    pub fn timestamp_millis(&self) -> Option<i64> {
        match self.details.get("timestamp")? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|time| time.timestamp_millis()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// A single line on an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Unit price in cents
    pub price_cents: i64,
}

impl OrderItem {
    pub fn line_total_cents(&self) -> i64 {
        self.price_cents.saturating_mul(i64::from(self.quantity))
    }
}

/// Parses `name[:quantity[:price]]`, e.g. `Burger:2:8.50`.
impl FromStr for OrderItem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let name = parts.next().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(Error::InvalidInput(format!("item '{s}' has no name")));
        }

        let quantity = match parts.next().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|quantity| *quantity > 0)
                .ok_or_else(|| Error::InvalidInput(format!("invalid quantity '{raw}'")))?,
        };

        let price_cents = match parts.next().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => parse_price_cents(raw)?,
        };

        if parts.next().is_some() {
            return Err(Error::InvalidInput(format!(
                "item '{s}' must look like name[:quantity[:price]]"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            quantity,
            price_cents,
        })
    }
}

fn parse_price_cents(raw: &str) -> Result<i64> {
    let invalid = || Error::InvalidInput(format!("invalid price '{raw}'"));
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if fraction.len() > 2 || (whole.is_empty() && fraction.is_empty()) {
        return Err(invalid());
    }
    let digits_only = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) {
        return Err(invalid());
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };
    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(fraction))
        .ok_or_else(invalid)
}

/// Typed builder for orders created at this register
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    pub items: Vec<OrderItem>,
    pub created_by: Option<String>,
    /// Use this id instead of generating one
    pub id: Option<OrderId>,
}

impl OrderDraft {
    #[must_use]
    pub fn new(items: Vec<OrderItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn created_by(mut self, operator: impl Into<String>) -> Self {
        self.created_by = Some(operator.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn total_cents(&self) -> i64 {
        self.items
            .iter()
            .map(OrderItem::line_total_cents)
            .fold(0, i64::saturating_add)
    }

    /// Build the order record with `pending` status and payment status
    pub fn into_order(self) -> Result<Order> {
        if self.items.is_empty() {
            return Err(Error::InvalidInput(
                "an order needs at least one item".to_string(),
            ));
        }

        let total = self.total_cents();
        let mut order = Order::new(self.id.unwrap_or_else(OrderId::generate))
            .with_detail("items", serde_json::to_value(&self.items)?)
            .with_detail("total", total)
            .with_detail("status", "pending")
            .with_detail("paymentStatus", "pending")
            .with_detail("timestamp", chrono::Utc::now().to_rfc3339());
        if let Some(operator) = self.created_by {
            order = order.with_detail("createdBy", operator);
        }
        Ok(order)
    }
}
