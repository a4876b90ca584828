use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{OperationId, OperationKind, OperationPayload};

/// A fire-and-forget mutation waiting for a handler to deliver it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub payload: OperationPayload,
    pub retry_count: u32,
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl PendingOperation {
    pub fn new(
        kind: OperationKind,
        payload: OperationPayload,
        created_at: DateTime<Utc>,
        next_retry_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OperationId::generate(&kind, created_at),
            kind,
            payload,
            retry_count: 0,
            next_retry_at,
            created_at,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at <= now
    }
}
