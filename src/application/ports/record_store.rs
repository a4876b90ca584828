use crate::domain::entities::{LocalRecord, PendingChange, PendingChangeDraft};
use crate::domain::value_objects::{RecordData, RecordId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Local durable store for one or more record collections plus their pending-change log.
///
/// Every method that touches both a record and the log does so atomically.
#[async_trait]
pub trait RecordPersistence: Send + Sync {
    async fn get_record(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<LocalRecord>, AppError>;

    async fn list_records(&self, collection: &str) -> Result<Vec<LocalRecord>, AppError>;

    /// Replace every synced record with `records`. Unsynced records are kept and
    /// shadow server copies with the same id. Returns the merged view.
    async fn replace_synced(
        &self,
        collection: &str,
        records: &[LocalRecord],
    ) -> Result<Vec<LocalRecord>, AppError>;

    async fn put_record(&self, collection: &str, record: &LocalRecord) -> Result<(), AppError>;

    /// Upsert `record` and append `change` in one transaction.
    async fn write_with_change(
        &self,
        collection: &str,
        record: &LocalRecord,
        change: PendingChangeDraft,
    ) -> Result<PendingChange, AppError>;

    /// Follow `id` through any alias, merge `updates` into the stored record, mark it
    /// unsynced and append an update change, in one transaction. Returns `None`
    /// when no record exists under the resolved id.
    async fn update_with_change(
        &self,
        collection: &str,
        id: &RecordId,
        updates: &RecordData,
        at: DateTime<Utc>,
    ) -> Result<Option<(LocalRecord, PendingChange)>, AppError>;

    /// Pending changes in append order.
    async fn pending_changes(&self, collection: &str) -> Result<Vec<PendingChange>, AppError>;

    /// Swap the placeholder record for the server copy, alias the old id, retarget
    /// later changes and drop the applied change, in one transaction.
    async fn reconcile_create(
        &self,
        collection: &str,
        change_id: i64,
        local_id: &RecordId,
        server: &LocalRecord,
    ) -> Result<(), AppError>;

    /// Drop the applied change and flip the record to synced when nothing else is pending for it.
    async fn confirm_update(
        &self,
        collection: &str,
        change_id: i64,
        record_id: &RecordId,
    ) -> Result<(), AppError>;

    async fn record_change_failure(&self, change_id: i64, error: &str) -> Result<(), AppError>;

    async fn unsynced_count(&self, collection: &str) -> Result<u64, AppError>;

    /// Follow a reconciled placeholder id to its server id. Unknown ids resolve to themselves.
    async fn resolve_id(&self, collection: &str, id: &RecordId) -> Result<RecordId, AppError>;

    async fn clear_collection(&self, collection: &str) -> Result<(), AppError>;
}

/// Opens the local store on first use. Opening may fail, e.g. when the
/// database file is locked or the disk is full.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn RecordPersistence>, AppError>;
}
