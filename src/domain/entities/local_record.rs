use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{RecordData, RecordId, SyncFlag};

/// Cached copy of one logical entity (e.g. a map pin).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    pub id: RecordId,
    pub synced: SyncFlag,
    pub data: RecordData,
    pub cached_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalRecord {
    pub fn synced(id: RecordId, data: RecordData, at: DateTime<Utc>) -> Self {
        Self {
            id,
            synced: SyncFlag::Yes,
            data,
            cached_at: at,
            updated_at: at,
        }
    }

    pub fn unsynced(id: RecordId, data: RecordData, at: DateTime<Utc>) -> Self {
        Self {
            id,
            synced: SyncFlag::No,
            data,
            cached_at: at,
            updated_at: at,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced.is_synced()
    }
}

/// A record as returned by the remote API: server id plus domain fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub id: RecordId,
    pub data: RecordData,
}

impl RemoteRecord {
    pub fn into_local(self, at: DateTime<Utc>) -> LocalRecord {
        LocalRecord::synced(self.id, self.data, at)
    }
}
