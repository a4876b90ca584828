use serde::{Deserialize, Serialize};
use std::fmt;

/// `No` marks local mutations not yet confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncFlag {
    Yes,
    No,
}

impl SyncFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncFlag::Yes => "yes",
            SyncFlag::No => "no",
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncFlag::Yes)
    }
}

impl fmt::Display for SyncFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SyncFlag {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "yes" => Ok(SyncFlag::Yes),
            "no" => Ok(SyncFlag::No),
            other => Err(format!("Unknown synced flag: {other}")),
        }
    }
}
