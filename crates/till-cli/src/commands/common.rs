use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use till_core::config::SyncConfig;
use till_core::services::DatabaseService;
use till_core::sync::{OrderTransport, SubmitOutcome, SyncHandle, SyncWorker};
use till_core::{Order, OrderDraft, OrderId, OrderItem, QueuedOrder};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct OrderListItem {
    pub id: String,
    pub total_cents: Option<i64>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub created_by: Option<String>,
    pub timestamp: Option<i64>,
    pub relative_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub sequence_id: i64,
    pub order_id: String,
    pub enqueued_at: i64,
    pub enqueued_at_iso: String,
    pub total_cents: Option<i64>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TILL_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("till")
        .join("till.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

/// Environment config with the `--endpoint` flag applied on top
pub fn load_sync_config(endpoint: Option<&str>) -> Result<SyncConfig, CliError> {
    let config = SyncConfig::from_env()?;
    Ok(match endpoint {
        Some(endpoint) => config.with_order_endpoint(endpoint),
        None => config,
    })
}

pub fn start_worker(config: &SyncConfig, db: &DatabaseService) -> Result<SyncHandle, CliError> {
    Ok(SyncWorker::spawn_http(config, Arc::new(db.clone()))?)
}

pub fn start_worker_with(
    config: &SyncConfig,
    db: &DatabaseService,
    transport: Arc<dyn OrderTransport>,
) -> SyncHandle {
    SyncWorker::spawn(config, Arc::new(db.clone()), transport)
}

pub fn parse_items(raw_items: &[String]) -> Result<Vec<OrderItem>, CliError> {
    let items = raw_items
        .iter()
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .map(str::parse::<OrderItem>)
        .collect::<Result<Vec<_>, _>>()?;

    if items.is_empty() {
        return Err(CliError::EmptyOrder);
    }
    Ok(items)
}

pub fn build_order(
    raw_items: &[String],
    created_by: Option<&str>,
    id: Option<&str>,
) -> Result<Order, CliError> {
    let mut draft = OrderDraft::new(parse_items(raw_items)?);
    if let Some(operator) = created_by.map(str::trim).filter(|name| !name.is_empty()) {
        draft = draft.created_by(operator);
    }
    if let Some(id) = id {
        draft = draft.with_id(id.trim().parse::<OrderId>()?);
    }
    Ok(draft.into_order()?)
}

/// Operator-facing line for a submission outcome. A lost order is an error.
pub fn describe_outcome(order_id: &OrderId, outcome: &SubmitOutcome) -> Result<String, CliError> {
    match outcome {
        SubmitOutcome::Delivered => Ok(format!("Sent {order_id}")),
        SubmitOutcome::Buffered { sequence_id } => Ok(format!(
            "Saved {order_id} offline (queue #{sequence_id}); it will sync when the network returns"
        )),
        SubmitOutcome::Lost { error } => Err(CliError::OrderLost {
            order_id: order_id.to_string(),
            error: error.clone(),
        }),
    }
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

fn detail_text(order: &Order, key: &str) -> Option<String> {
    order
        .detail(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn order_total(order: &Order) -> Option<i64> {
    order.detail("total").and_then(serde_json::Value::as_i64)
}

pub fn order_to_list_item(order: &Order) -> OrderListItem {
    let now_ms = Utc::now().timestamp_millis();
    let timestamp = order.timestamp_millis();
    OrderListItem {
        id: order.id.to_string(),
        total_cents: order_total(order),
        status: detail_text(order, "status"),
        payment_status: detail_text(order, "paymentStatus"),
        created_by: detail_text(order, "createdBy"),
        timestamp,
        relative_time: timestamp.map(|ts| format_relative_time(ts, now_ms)),
    }
}

pub fn format_order_lines(orders: &[&Order]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    orders
        .iter()
        .map(|order| {
            let total = order_total(order).map_or_else(|| "-".to_string(), format_cents);
            let status = detail_text(order, "status").unwrap_or_else(|| "-".to_string());
            let when = order
                .timestamp_millis()
                .map_or_else(String::new, |ts| format_relative_time(ts, now_ms));
            match detail_text(order, "createdBy") {
                Some(author) => {
                    format!("{}  {total:>9}  {status:<10} {when}  by {author}", order.id)
                }
                None => format!("{}  {total:>9}  {status:<10} {when}", order.id),
            }
        })
        .collect()
}

pub fn queue_to_list_item(queued: &QueuedOrder) -> QueueListItem {
    QueueListItem {
        sequence_id: queued.sequence_id,
        order_id: queued.payload.id.to_string(),
        enqueued_at: queued.enqueued_at,
        enqueued_at_iso: format_timestamp(queued.enqueued_at),
        total_cents: order_total(&queued.payload),
    }
}

pub fn format_queue_lines(queued: &[QueuedOrder]) -> Vec<String> {
    queued
        .iter()
        .map(|entry| {
            let total = order_total(&entry.payload).map_or_else(|| "-".to_string(), format_cents);
            format!(
                "#{:<4} {}  {}  {total:>9}",
                entry.sequence_id,
                format_timestamp(entry.enqueued_at),
                entry.payload.id
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
