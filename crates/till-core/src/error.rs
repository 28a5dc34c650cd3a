//! Error types for till-core

use thiserror::Error;

/// Result type alias using till-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in till-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Live transmission failed before a response was obtained
    #[error("Transport error: {0}")]
    Transport(String),

    /// Background sync worker has shut down
    #[error("Sync worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
