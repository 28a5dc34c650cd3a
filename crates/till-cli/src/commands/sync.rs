use std::path::Path;

use till_core::config::SyncConfig;
use till_core::services::DatabaseService;
use till_core::sync::{Foreground, OrderLedger, ReconcileReport, SyncHandle, SyncNotice};

use crate::commands::common::{load_sync_config, open_database, start_worker};
use crate::error::CliError;

pub async fn run_sync(endpoint: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let config = load_sync_config(endpoint)?;
    let db = open_database(db_path).await?;
    let handle = start_worker(&config, &db)?;

    let (report, merged) = sync_into_ledger(&config, &db, &handle).await?;
    println!("{}", describe_sync(&report, merged));
    Ok(())
}

/// Reconcile once as a foreground and persist whatever was merged.
/// Returns the report and the number of newly merged orders.
pub async fn sync_into_ledger(
    config: &SyncConfig,
    db: &DatabaseService,
    handle: &SyncHandle,
) -> Result<(ReconcileReport, usize), CliError> {
    let ledger = OrderLedger::from_orders(db.load_ledger().await?);
    let mut foreground = Foreground::new(ledger, handle.subscribe(), config.notice_duration);

    let report = handle.check_sync_and_wait().await?;
    let merged = foreground.apply_pending();
    db.prepend_to_ledger(&merged).await?;

    Ok((report, merged.len()))
}

pub fn describe_sync(report: &ReconcileReport, merged: usize) -> String {
    match report {
        ReconcileReport::Skipped => "A sync is already running".to_string(),
        ReconcileReport::Empty => "Nothing to sync".to_string(),
        ReconcileReport::Retained { orders } => {
            format!("{orders} queued orders kept: no register was listening")
        }
        ReconcileReport::Broadcast { .. } => SyncNotice { count: merged }.to_string(),
    }
}
