use std::path::Path;

use till_core::sync::SubmitOutcome;

use crate::commands::common::{
    build_order, describe_outcome, load_sync_config, open_database, start_worker,
};
use crate::error::CliError;

pub async fn run_submit(
    raw_items: &[String],
    created_by: Option<&str>,
    id: Option<&str>,
    as_json: bool,
    endpoint: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let order = build_order(raw_items, created_by, id)?;
    let config = load_sync_config(endpoint)?;
    let db = open_database(db_path).await?;
    let handle = start_worker(&config, &db)?;

    let outcome = handle.submit(order.clone()).await;
    if outcome == SubmitOutcome::Delivered {
        db.prepend_to_ledger(std::slice::from_ref(&order)).await?;
    }

    if as_json {
        let value = serde_json::json!({
            "orderId": order.id,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    let line = describe_outcome(&order.id, &outcome)?;
    if !as_json {
        println!("{line}");
    }
    Ok(())
}
