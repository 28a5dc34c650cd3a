//! Database layer for Till

mod connection;
mod ledger_repository;
mod migrations;
mod queue_repository;

pub use connection::Database;
pub use ledger_repository::LibSqlLedgerRepository;
pub use queue_repository::LibSqlQueueRepository;
