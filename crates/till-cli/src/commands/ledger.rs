use std::path::Path;

use till_core::sync::OrderLedger;
use till_core::Order;

use crate::commands::common::{
    format_order_lines, open_database, order_to_list_item, OrderListItem,
};
use crate::error::CliError;

pub async fn run_ledger(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let ledger = OrderLedger::from_orders(db.load_ledger().await?);
    let orders: Vec<&Order> = ledger.newest_first().into_iter().take(limit).collect();

    if as_json {
        let json_items = orders
            .iter()
            .map(|order| order_to_list_item(order))
            .collect::<Vec<OrderListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for line in format_order_lines(&orders) {
        println!("{line}");
    }
    Ok(())
}
