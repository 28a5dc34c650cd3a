use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] till_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No items provided. Use name[:quantity[:price]], e.g. \"Burger:2:8.50\"")]
    EmptyOrder,
    #[error("Order {order_id} was NOT recorded anywhere: {error}")]
    OrderLost { order_id: String, error: String },
    #[error("Unknown register command '{0}'. Type `help` for the list.")]
    UnknownCommand(String),
}
