//! Shared cross-component state types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Network reachability as last observed by the connectivity monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }

    /// Persistent banner shown to the operator, if any.
    pub const fn banner(self) -> Option<&'static str> {
        match self {
            Self::Online => None,
            Self::Offline => {
                Some("Offline: orders are saved on this device and sync when the network returns")
            }
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

impl FromStr for Connectivity {
    type Err = crate::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "online" | "up" => Ok(Self::Online),
            "offline" | "down" => Ok(Self::Offline),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown connectivity state '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signal_names() {
        assert_eq!("online".parse::<Connectivity>().unwrap(), Connectivity::Online);
        assert_eq!(" DOWN ".parse::<Connectivity>().unwrap(), Connectivity::Offline);
        assert!("sideways".parse::<Connectivity>().is_err());
    }

    #[test]
    fn only_offline_shows_banner() {
        assert!(Connectivity::Online.banner().is_none());
        assert!(Connectivity::Offline.banner().is_some());
    }
}
