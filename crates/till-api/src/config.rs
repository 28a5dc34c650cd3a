use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Where received orders are kept; in memory when unset
    pub db_path: Option<PathBuf>,
    pub max_body_bytes: usize,
    pub max_list_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TILL_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = optional_trimmed(&lookup, "TILL_API_DB_PATH").map(PathBuf::from);

        let max_body_bytes = value_or_default(&lookup, "TILL_API_MAX_BODY_BYTES", "262144")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "TILL_API_MAX_BODY_BYTES must be an integer in [1024, 10485760]".to_string(),
                )
            })?;
        if !(1_024..=10_485_760).contains(&max_body_bytes) {
            return Err(ConfigError::Invalid(
                "TILL_API_MAX_BODY_BYTES must be in [1024, 10485760]".to_string(),
            ));
        }

        let max_list_limit = value_or_default(&lookup, "TILL_API_MAX_LIST_LIMIT", "500")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "TILL_API_MAX_LIST_LIMIT must be an integer in [1, 10000]".to_string(),
                )
            })?;
        if !(1..=10_000).contains(&max_list_limit) {
            return Err(ConfigError::Invalid(
                "TILL_API_MAX_LIST_LIMIT must be in [1, 10000]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            db_path,
            max_body_bytes,
            max_list_limit,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
