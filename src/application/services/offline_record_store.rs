use crate::application::ports::{
    ConnectivitySignal, PersistenceProvider, RecordPersistence, RecordRemote,
};
use crate::domain::entities::{
    ChangeBody, ChangeDrainReport, DrainOutcome, LocalRecord, PendingChange, PendingChangeDraft,
    SkipReason,
};
use crate::domain::value_objects::{RecordData, RecordId, SyncFlag};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::error::AppError;
use crate::shared::events::{EventBus, SyncEvent};
use crate::shared::metrics::SyncMetrics;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

const TARGET: &str = "record_store";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    Server,
    Cache,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    pub records: Vec<LocalRecord>,
    pub source: FetchSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub record: Option<LocalRecord>,
    pub synced: bool,
}

impl WriteOutcome {
    fn failed() -> Self {
        Self {
            success: false,
            record: None,
            synced: false,
        }
    }

    fn remote(record: LocalRecord) -> Self {
        Self {
            success: true,
            record: Some(record),
            synced: true,
        }
    }

    fn local(record: LocalRecord) -> Self {
        Self {
            success: true,
            record: Some(record),
            synced: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub online: bool,
    pub unsynced: u64,
    pub pending_changes: usize,
}

/// Offline-first read/write API over one record collection.
///
/// Reads fall back to the local cache and writes fall back to a local copy
/// plus a pending change whenever the remote is unreachable. The pending log
/// is replayed by [`OfflineRecordStore::drain_pending_changes`].
pub struct OfflineRecordStore {
    collection: String,
    provider: Arc<dyn PersistenceProvider>,
    persistence: OnceCell<Arc<dyn RecordPersistence>>,
    remote: Arc<dyn RecordRemote>,
    connectivity: Arc<dyn ConnectivitySignal>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    metrics: Arc<SyncMetrics>,
    draining: AtomicBool,
}

pub struct OfflineRecordStoreBuilder {
    collection: String,
    provider: Arc<dyn PersistenceProvider>,
    remote: Arc<dyn RecordRemote>,
    connectivity: Arc<dyn ConnectivitySignal>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    metrics: Arc<SyncMetrics>,
}

impl OfflineRecordStoreBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> OfflineRecordStore {
        OfflineRecordStore {
            collection: self.collection,
            provider: self.provider,
            persistence: OnceCell::new(),
            remote: self.remote,
            connectivity: self.connectivity,
            clock: self.clock,
            events: self.events,
            metrics: self.metrics,
            draining: AtomicBool::new(false),
        }
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OfflineRecordStore {
    pub fn builder(
        collection: impl Into<String>,
        provider: Arc<dyn PersistenceProvider>,
        remote: Arc<dyn RecordRemote>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> OfflineRecordStoreBuilder {
        OfflineRecordStoreBuilder {
            collection: collection.into(),
            provider,
            remote,
            connectivity,
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
            metrics: Arc::new(SyncMetrics::default()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Open the local store. Safe to call repeatedly and concurrently; callers
    /// share a single open. A failed open is retried on the next call.
    pub async fn initialize(&self) -> Result<(), AppError> {
        self.persistence
            .get_or_try_init(|| self.provider.open())
            .await
            .map(|_| ())
    }

    async fn storage(&self) -> Option<Arc<dyn RecordPersistence>> {
        match self
            .persistence
            .get_or_try_init(|| self.provider.open())
            .await
        {
            Ok(store) => Some(Arc::clone(store)),
            Err(err) => {
                tracing::warn!(
                    target: TARGET,
                    collection = %self.collection,
                    error = %err,
                    "local storage unavailable"
                );
                None
            }
        }
    }

    /// Authoritative list when online, cached list otherwise.
    pub async fn fetch_all(&self) -> FetchResult {
        let Some(store) = self.storage().await else {
            return FetchResult {
                records: Vec::new(),
                source: FetchSource::None,
            };
        };

        if self.connectivity.is_online() {
            match self.remote.list().await {
                Ok(remote_records) => {
                    let now = self.clock.now();
                    let records: Vec<LocalRecord> = remote_records
                        .into_iter()
                        .map(|record| record.into_local(now))
                        .collect();
                    let merged = match store.replace_synced(&self.collection, &records).await {
                        Ok(merged) => merged,
                        Err(err) => {
                            tracing::warn!(
                                target: TARGET,
                                collection = %self.collection,
                                error = %err,
                                "failed to refresh cache from server list"
                            );
                            records
                        }
                    };
                    return FetchResult {
                        records: merged,
                        source: FetchSource::Server,
                    };
                }
                Err(err) => {
                    tracing::info!(
                        target: TARGET,
                        collection = %self.collection,
                        error = %err,
                        "remote list failed; serving cache"
                    );
                }
            }
        }

        match store.list_records(&self.collection).await {
            Ok(records) => FetchResult {
                records,
                source: FetchSource::Cache,
            },
            Err(err) => {
                tracing::warn!(target: TARGET, error = %err, "failed to read cache");
                FetchResult {
                    records: Vec::new(),
                    source: FetchSource::None,
                }
            }
        }
    }

    /// Create remotely when possible, otherwise under a local placeholder id.
    pub async fn create_local(&self, data: RecordData) -> WriteOutcome {
        let Some(store) = self.storage().await else {
            return WriteOutcome::failed();
        };

        if self.connectivity.is_online() {
            match self.remote.create(&data).await {
                Ok(remote) => {
                    let record = remote.into_local(self.clock.now());
                    if let Err(err) = store.put_record(&self.collection, &record).await {
                        tracing::warn!(
                            target: TARGET,
                            record_id = %record.id,
                            error = %err,
                            "created remotely but failed to cache"
                        );
                    }
                    return WriteOutcome::remote(record);
                }
                Err(err) => {
                    tracing::info!(
                        target: TARGET,
                        collection = %self.collection,
                        error = %err,
                        "remote create failed; storing locally"
                    );
                }
            }
        }

        let now = self.clock.now();
        let id = RecordId::generate_local(now);
        let record = LocalRecord::unsynced(id.clone(), data.clone(), now);
        match store
            .write_with_change(
                &self.collection,
                &record,
                PendingChangeDraft::create(id, data, now),
            )
            .await
        {
            Ok(change) => {
                tracing::debug!(
                    target: TARGET,
                    record_id = %record.id,
                    change_id = change.id,
                    "record created offline"
                );
                self.publish_unsynced(store.as_ref()).await;
                WriteOutcome::local(record)
            }
            Err(err) => {
                tracing::error!(
                    target: TARGET,
                    collection = %self.collection,
                    error = %err,
                    "failed to store offline create"
                );
                WriteOutcome::failed()
            }
        }
    }

    /// Patch remotely when possible, otherwise merge locally and queue the patch.
    ///
    /// Records that already have queued work, or still carry a placeholder id,
    /// always take the local path so their changes replay in order.
    pub async fn update_local(&self, id: &RecordId, updates: RecordData) -> WriteOutcome {
        let Some(store) = self.storage().await else {
            return WriteOutcome::failed();
        };

        let id = match store.resolve_id(&self.collection, id).await {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(target: TARGET, error = %err, "failed to resolve record alias");
                id.clone()
            }
        };
        let existing = match store.get_record(&self.collection, &id).await {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(target: TARGET, record_id = %id, error = %err, "failed to read record");
                None
            }
        };
        let has_queued_work = existing
            .as_ref()
            .map(|record| !record.is_synced())
            .unwrap_or(false);

        if self.connectivity.is_online() && !id.is_local() && !has_queued_work {
            match self.remote.update(&id, &updates).await {
                Ok(remote) => {
                    let now = self.clock.now();
                    let mut record = match existing {
                        Some(mut cached) => {
                            cached.data.merge(&remote.data);
                            cached.updated_at = now;
                            cached
                        }
                        None => remote.into_local(now),
                    };
                    record.synced = SyncFlag::Yes;
                    if let Err(err) = store.put_record(&self.collection, &record).await {
                        tracing::warn!(
                            target: TARGET,
                            record_id = %record.id,
                            error = %err,
                            "updated remotely but failed to cache"
                        );
                    }
                    return WriteOutcome::remote(record);
                }
                Err(err) => {
                    tracing::info!(
                        target: TARGET,
                        record_id = %id,
                        error = %err,
                        "remote update failed; storing locally"
                    );
                }
            }
        }

        match store
            .update_with_change(&self.collection, &id, &updates, self.clock.now())
            .await
        {
            Ok(Some((record, change))) => {
                tracing::debug!(
                    target: TARGET,
                    record_id = %record.id,
                    change_id = change.id,
                    "record updated offline"
                );
                self.publish_unsynced(store.as_ref()).await;
                WriteOutcome::local(record)
            }
            Ok(None) => {
                tracing::warn!(
                    target: TARGET,
                    record_id = %id,
                    "cannot update a record missing from the local cache"
                );
                WriteOutcome::failed()
            }
            Err(err) => {
                tracing::error!(
                    target: TARGET,
                    record_id = %id,
                    error = %err,
                    "failed to store offline update"
                );
                WriteOutcome::failed()
            }
        }
    }

    /// Replay the pending-change log against the remote in append order.
    ///
    /// A change that fails stays queued. Later changes for the same record are
    /// held back for this pass; changes for other records still go out.
    pub async fn drain_pending_changes(&self) -> DrainOutcome<ChangeDrainReport> {
        if !self.connectivity.is_online() {
            return DrainOutcome::Skipped(SkipReason::Offline);
        }
        if self.draining.swap(true, Ordering::AcqRel) {
            return DrainOutcome::Skipped(SkipReason::AlreadyDraining);
        }
        let _guard = DrainGuard(&self.draining);

        let Some(store) = self.storage().await else {
            return DrainOutcome::Skipped(SkipReason::StorageUnavailable);
        };
        let changes = match store.pending_changes(&self.collection).await {
            Ok(changes) => changes,
            Err(err) => {
                tracing::warn!(target: TARGET, error = %err, "failed to read pending changes");
                return DrainOutcome::Skipped(SkipReason::StorageUnavailable);
            }
        };
        if changes.is_empty() {
            return DrainOutcome::Skipped(SkipReason::Empty);
        }

        tracing::info!(
            target: TARGET,
            collection = %self.collection,
            pending = changes.len(),
            "draining pending changes"
        );

        let mut report = ChangeDrainReport::default();
        let mut blocked: HashSet<RecordId> = HashSet::new();

        for change in changes {
            if !self.connectivity.is_online() {
                tracing::info!(target: TARGET, "went offline mid-drain; stopping");
                break;
            }

            // An earlier create in this pass may have remapped the target.
            let target = match store.resolve_id(&self.collection, &change.record_id).await {
                Ok(resolved) => resolved,
                Err(_) => change.record_id.clone(),
            };
            if blocked.contains(&target) {
                report.deferred += 1;
                continue;
            }

            report.attempted += 1;
            match self.apply_change(store.as_ref(), &change, &target).await {
                Ok(ChangeApplied::Created { server_id }) => {
                    report.created += 1;
                    self.metrics.changes.record_success();
                    self.events.publish(SyncEvent::RecordReconciled {
                        collection: self.collection.clone(),
                        local_id: change.record_id.to_string(),
                        server_id: server_id.to_string(),
                    });
                }
                Ok(ChangeApplied::Updated) => {
                    report.updated += 1;
                    self.metrics.changes.record_success();
                }
                Err(message) => {
                    report.failed += 1;
                    self.metrics.changes.record_failure();
                    blocked.insert(target.clone());
                    tracing::warn!(
                        target: TARGET,
                        change_id = change.id,
                        record_id = %target,
                        action = %change.action(),
                        error = %message,
                        "pending change failed; will retry on next drain"
                    );
                    if let Err(err) = store.record_change_failure(change.id, &message).await {
                        tracing::warn!(
                            target: TARGET,
                            change_id = change.id,
                            error = %err,
                            "failed to record change failure"
                        );
                    }
                }
            }
        }

        report.remaining = store
            .pending_changes(&self.collection)
            .await
            .map(|changes| changes.len())
            .unwrap_or(report.failed + report.deferred);
        self.publish_unsynced(store.as_ref()).await;
        DrainOutcome::Completed(report)
    }

    async fn apply_change(
        &self,
        store: &dyn RecordPersistence,
        change: &PendingChange,
        target: &RecordId,
    ) -> Result<ChangeApplied, String> {
        match &change.body {
            ChangeBody::Create { record } => {
                let remote = self
                    .remote
                    .create(record)
                    .await
                    .map_err(|err| err.to_string())?;
                let server = remote.into_local(self.clock.now());
                let server_id = server.id.clone();
                store
                    .reconcile_create(&self.collection, change.id, &change.record_id, &server)
                    .await
                    .map_err(|err| err.to_string())?;
                tracing::info!(
                    target: TARGET,
                    local_id = %change.record_id,
                    server_id = %server_id,
                    "offline record reconciled"
                );
                Ok(ChangeApplied::Created { server_id })
            }
            ChangeBody::Update { updates } => {
                self.remote
                    .update(target, updates)
                    .await
                    .map_err(|err| err.to_string())?;
                store
                    .confirm_update(&self.collection, change.id, target)
                    .await
                    .map_err(|err| err.to_string())?;
                Ok(ChangeApplied::Updated)
            }
        }
    }

    pub async fn unsynced_count(&self) -> u64 {
        let Some(store) = self.storage().await else {
            return 0;
        };
        store
            .unsynced_count(&self.collection)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(target: TARGET, error = %err, "failed to count unsynced records");
                0
            })
    }

    pub async fn pending_changes(&self) -> Vec<PendingChange> {
        let Some(store) = self.storage().await else {
            return Vec::new();
        };
        store
            .pending_changes(&self.collection)
            .await
            .unwrap_or_default()
    }

    pub async fn status(&self) -> StoreStatus {
        StoreStatus {
            online: self.connectivity.is_online(),
            unsynced: self.unsynced_count().await,
            pending_changes: self.pending_changes().await.len(),
        }
    }

    /// Drop every cached record and pending change of this collection.
    pub async fn clear_offline_data(&self) -> Result<(), AppError> {
        let Some(store) = self.storage().await else {
            return Ok(());
        };
        store.clear_collection(&self.collection).await?;
        self.events.publish(SyncEvent::RecordsChanged {
            collection: self.collection.clone(),
            unsynced: 0,
        });
        Ok(())
    }

    async fn publish_unsynced(&self, store: &dyn RecordPersistence) {
        if let Ok(unsynced) = store.unsynced_count(&self.collection).await {
            self.events.publish(SyncEvent::RecordsChanged {
                collection: self.collection.clone(),
                unsynced,
            });
        }
    }
}

enum ChangeApplied {
    Created { server_id: RecordId },
    Updated,
}
