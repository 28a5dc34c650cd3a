use std::path::Path;

use crate::commands::common::{
    format_queue_lines, open_database, queue_to_list_item, QueueListItem,
};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let queued = db.queued_orders().await?;

    if as_json {
        let json_items = queued
            .iter()
            .map(queue_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if queued.is_empty() {
        println!("Offline queue is empty.");
        return Ok(());
    }

    for line in format_queue_lines(&queued) {
        println!("{line}");
    }
    Ok(())
}
