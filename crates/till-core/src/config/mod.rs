//! Runtime configuration for the sync pipeline.
//!
//! Values come from the environment (optionally seeded from `.env` by the
//! binaries). Every setting has a default so a register works out of the box
//! against a local `till-api`.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::PurgePolicy;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_ORDER_ENDPOINT: &str = "http://127.0.0.1:8080/v1/orders";
const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_NOTICE_MS: u64 = 2_000;
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings shared by the interception layer, reconciler, and foreground
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Order-sync endpoint receiving `POST` order JSON
    pub order_endpoint: String,
    /// Upper bound on one live transmission attempt
    pub send_timeout: Duration,
    /// What reconciliation does when nobody received a broadcast
    pub purge_policy: PurgePolicy,
    /// How long the "N orders synchronized" notice stays up
    pub notice_duration: Duration,
    /// Buffered `submit-result` notifications per subscriber
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            order_endpoint: DEFAULT_ORDER_ENDPOINT.to_string(),
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            purge_policy: PurgePolicy::default(),
            notice_duration: Duration::from_millis(DEFAULT_NOTICE_MS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let order_endpoint = value_or_default(&lookup, "TILL_ORDER_ENDPOINT", DEFAULT_ORDER_ENDPOINT);
        if !is_http_url(&order_endpoint) {
            return Err(Error::Config(
                "TILL_ORDER_ENDPOINT must start with http:// or https://".to_string(),
            ));
        }

        let send_timeout_ms = parse_in_range(
            &lookup,
            "TILL_SEND_TIMEOUT_MS",
            DEFAULT_SEND_TIMEOUT_MS,
            100..=60_000,
        )?;
        let notice_ms = parse_in_range(&lookup, "TILL_NOTICE_MS", DEFAULT_NOTICE_MS, 0..=60_000)?;
        let event_capacity = parse_in_range(
            &lookup,
            "TILL_EVENT_CAPACITY",
            DEFAULT_EVENT_CAPACITY as u64,
            1..=4_096,
        )?;

        let purge_policy = match normalize_text_option(lookup("TILL_PURGE_POLICY")) {
            Some(raw) => raw.parse()?,
            None => PurgePolicy::default(),
        };

        Ok(Self {
            order_endpoint: order_endpoint.trim_end_matches('/').to_string(),
            send_timeout: Duration::from_millis(send_timeout_ms),
            purge_policy,
            notice_duration: Duration::from_millis(notice_ms),
            event_capacity: usize::try_from(event_capacity).unwrap_or(DEFAULT_EVENT_CAPACITY),
        })
    }

    #[must_use]
    pub fn with_order_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.order_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub const fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_purge_policy(mut self, policy: PurgePolicy) -> Self {
        self.purge_policy = policy;
        self
    }
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(default);
    };
    let value = raw.parse::<u64>().map_err(|_| {
        Error::Config(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    })?;
    if !range.contains(&value) {
        return Err(Error::Config(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    normalize_text_option(lookup(name)).unwrap_or_else(|| default.to_string())
}
