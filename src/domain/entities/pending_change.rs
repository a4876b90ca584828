use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_objects::{RecordData, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ChangeAction {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "create" => Ok(ChangeAction::Create),
            "update" => Ok(ChangeAction::Update),
            other => Err(format!("Unknown change action: {other}")),
        }
    }
}

/// What a change carries to the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ChangeBody {
    /// Full canonical fields of the offline-created record.
    Create { record: RecordData },
    /// Partial field set to PATCH.
    Update { updates: RecordData },
}

impl ChangeBody {
    pub fn action(&self) -> ChangeAction {
        match self {
            ChangeBody::Create { .. } => ChangeAction::Create,
            ChangeBody::Update { .. } => ChangeAction::Update,
        }
    }
}

/// Entry of the append-only pending-change log. Ids increase in append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub id: i64,
    pub record_id: RecordId,
    pub body: ChangeBody,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl PendingChange {
    pub fn action(&self) -> ChangeAction {
        self.body.action()
    }
}

/// A change not yet assigned a log id.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChangeDraft {
    pub record_id: RecordId,
    pub body: ChangeBody,
    pub created_at: DateTime<Utc>,
}

impl PendingChangeDraft {
    pub fn create(record_id: RecordId, record: RecordData, at: DateTime<Utc>) -> Self {
        Self {
            record_id,
            body: ChangeBody::Create { record },
            created_at: at,
        }
    }

    pub fn update(record_id: RecordId, updates: RecordData, at: DateTime<Utc>) -> Self {
        Self {
            record_id,
            body: ChangeBody::Update { updates },
            created_at: at,
        }
    }
}
