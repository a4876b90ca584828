mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claimsync::application::ports::{PersistenceProvider, RecordPersistence};
use claimsync::application::services::{FetchSource, OfflineRecordStore};
use claimsync::domain::entities::{
    ChangeAction, LocalRecord, PendingChange, PendingChangeDraft, SkipReason,
};
use claimsync::domain::value_objects::{RecordData, RecordId, SyncFlag};
use claimsync::infrastructure::connectivity::ConnectivityMonitor;
use claimsync::infrastructure::offline::{ReadyPersistence, SqliteRecordStore};
use claimsync::shared::error::AppError;
use claimsync::shared::events::SyncEvent;
use common::mocks::{StubRemote, UnavailablePersistence};
use common::{COLLECTION, RecordStoreFixture, collect_events, data, memory_pool};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::test]
async fn offline_create_is_reconciled_after_reconnect() {
    let fx = RecordStoreFixture::new(false).await;
    let mut events = fx.events.subscribe();

    let outcome = fx
        .store
        .create_local(data(json!({"lat": 35.1, "lng": -97.4, "damage": "hail"})))
        .await;
    assert!(outcome.success);
    assert!(!outcome.synced);
    let local = outcome.record.unwrap();
    assert!(local.id.is_local());
    assert_eq!(local.synced, SyncFlag::No);
    assert_eq!(fx.store.unsynced_count().await, 1);

    let pending = fx.store.pending_changes().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].action(), ChangeAction::Create);
    assert!(fx.remote.calls().await.is_empty());

    fx.connectivity.go_online();
    let report = fx.store.drain_pending_changes().await.report().cloned().unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.remaining, 0);

    assert_eq!(fx.store.unsynced_count().await, 0);
    assert!(fx.store.pending_changes().await.is_empty());

    let server_id = RecordId::parse("srv-1").unwrap();
    let cached = fx
        .persistence
        .get_record(COLLECTION, &server_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.synced, SyncFlag::Yes);
    assert_eq!(cached.data.get("damage"), Some(&json!("hail")));
    assert!(fx
        .persistence
        .get_record(COLLECTION, &local.id)
        .await
        .unwrap()
        .is_none());

    let reconciled = collect_events(&mut events).into_iter().any(|event| {
        matches!(
            event,
            SyncEvent::RecordReconciled { ref local_id, ref server_id, .. }
                if local_id == local.id.as_str() && server_id == "srv-1"
        )
    });
    assert!(reconciled);
}

#[tokio::test]
async fn updates_to_placeholder_ids_follow_the_reconciled_record() {
    let fx = RecordStoreFixture::new(false).await;
    let local_id = fx
        .store
        .create_local(data(json!({"lat": 1.0})))
        .await
        .record
        .unwrap()
        .id;

    let updated = fx
        .store
        .update_local(&local_id, data(json!({"note": "roof damage"})))
        .await;
    assert!(updated.success);
    assert!(!updated.synced);
    assert_eq!(fx.store.pending_changes().await.len(), 2);

    fx.connectivity.go_online();
    let report = fx.store.drain_pending_changes().await.report().cloned().unwrap();
    assert_eq!((report.created, report.updated), (1, 1));
    assert_eq!(fx.remote.calls().await, vec!["create", "update:srv-1"]);

    let server = fx.remote.record("srv-1").await.unwrap();
    assert_eq!(server.data.get("note"), Some(&json!("roof damage")));

    // The old placeholder still addresses the record.
    let again = fx
        .store
        .update_local(&local_id, data(json!({"note": "confirmed"})))
        .await;
    assert!(again.synced);
    assert_eq!(again.record.unwrap().id.as_str(), "srv-1");
    assert_eq!(
        fx.remote.calls().await.last().map(String::as_str),
        Some("update:srv-1")
    );
}

#[tokio::test]
async fn fetch_all_reports_its_source() {
    let fx = RecordStoreFixture::new(true).await;
    fx.remote.seed("srv-10", data(json!({"lat": 2.0}))).await;

    let fetched = fx.store.fetch_all().await;
    assert_eq!(fetched.source, FetchSource::Server);
    assert_eq!(fetched.records.len(), 1);
    assert!(fetched.records[0].is_synced());

    fx.remote.set_unreachable(true).await;
    let fetched = fx.store.fetch_all().await;
    assert_eq!(fetched.source, FetchSource::Cache);
    assert_eq!(fetched.records.len(), 1);

    fx.connectivity.go_offline();
    fx.remote.set_unreachable(false).await;
    let calls_before = fx.remote.calls().await.len();
    let fetched = fx.store.fetch_all().await;
    assert_eq!(fetched.source, FetchSource::Cache);
    assert_eq!(fx.remote.calls().await.len(), calls_before);
}

#[tokio::test]
async fn server_refresh_keeps_unsynced_records() {
    let fx = RecordStoreFixture::new(false).await;
    let local = fx
        .store
        .create_local(data(json!({"lat": 3.0})))
        .await
        .record
        .unwrap();

    fx.remote.seed("srv-20", data(json!({"lat": 4.0}))).await;
    fx.connectivity.go_online();
    let fetched = fx.store.fetch_all().await;

    assert_eq!(fetched.source, FetchSource::Server);
    let ids: Vec<&str> = fetched.records.iter().map(|r| r.id.as_str()).collect();
    assert!(ids.contains(&"srv-20"));
    assert!(ids.contains(&local.id.as_str()));
    assert_eq!(fx.store.unsynced_count().await, 1);
}

#[tokio::test]
async fn remote_failure_while_online_falls_back_to_local_create() {
    let fx = RecordStoreFixture::new(true).await;
    fx.remote.set_failing_creates(true).await;

    let outcome = fx.store.create_local(data(json!({"lat": 5.0}))).await;
    assert!(outcome.success);
    assert!(!outcome.synced);
    assert!(outcome.record.unwrap().id.is_local());

    fx.remote.set_failing_creates(false).await;
    let report = fx.store.drain_pending_changes().await.report().cloned().unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(fx.remote.len().await, 1);
}

#[tokio::test]
async fn online_create_is_synced_immediately() {
    let fx = RecordStoreFixture::new(true).await;
    let outcome = fx.store.create_local(data(json!({"lat": 6.0}))).await;

    assert!(outcome.success);
    assert!(outcome.synced);
    assert_eq!(outcome.record.unwrap().id.as_str(), "srv-1");
    assert_eq!(fx.store.unsynced_count().await, 0);
    assert!(fx.store.pending_changes().await.is_empty());
}

#[tokio::test]
async fn failed_change_blocks_only_its_own_record() {
    let fx = RecordStoreFixture::new(true).await;
    fx.remote.seed("srv-a", data(json!({"n": 0}))).await;
    fx.remote.seed("srv-b", data(json!({"n": 0}))).await;
    fx.store.fetch_all().await;

    fx.connectivity.go_offline();
    let a = RecordId::parse("srv-a").unwrap();
    let b = RecordId::parse("srv-b").unwrap();
    assert!(fx.store.update_local(&a, data(json!({"n": 1}))).await.success);
    assert!(fx.store.update_local(&b, data(json!({"n": 1}))).await.success);
    assert!(fx.store.update_local(&a, data(json!({"n": 2}))).await.success);

    fx.remote.fail_updates_for("srv-a").await;
    fx.connectivity.go_online();
    let report = fx.store.drain_pending_changes().await.report().cloned().unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(report.remaining, 2);

    let pending = fx.store.pending_changes().await;
    assert!(pending.iter().all(|change| change.record_id == a));
    assert_eq!(pending[0].attempts, 1);
    assert!(pending[0].last_error.is_some());
    assert_eq!(pending[1].attempts, 0);
    assert_eq!(fx.store.unsynced_count().await, 1);

    let b_cached = fx.persistence.get_record(COLLECTION, &b).await.unwrap().unwrap();
    assert!(b_cached.is_synced());
}

#[tokio::test]
async fn records_with_queued_work_are_updated_locally_even_when_online() {
    let fx = RecordStoreFixture::new(true).await;
    fx.remote.seed("srv-c", data(json!({"n": 0}))).await;
    fx.store.fetch_all().await;
    let id = RecordId::parse("srv-c").unwrap();

    fx.connectivity.go_offline();
    fx.store.update_local(&id, data(json!({"n": 1}))).await;
    fx.connectivity.go_online();

    let outcome = fx.store.update_local(&id, data(json!({"n": 2}))).await;
    assert!(outcome.success);
    assert!(!outcome.synced);
    assert!(!fx.remote.calls().await.iter().any(|call| call.starts_with("update")));

    fx.store.drain_pending_changes().await;
    assert_eq!(
        fx.remote.calls().await,
        vec!["list", "update:srv-c", "update:srv-c"]
    );
    assert_eq!(
        fx.remote.record("srv-c").await.unwrap().data.get("n"),
        Some(&json!(2))
    );
    assert_eq!(fx.store.unsynced_count().await, 0);
}

#[tokio::test]
async fn updating_an_unknown_record_offline_fails() {
    let fx = RecordStoreFixture::new(false).await;
    let outcome = fx
        .store
        .update_local(&RecordId::parse("srv-missing").unwrap(), data(json!({"n": 1})))
        .await;
    assert!(!outcome.success);
    assert!(outcome.record.is_none());
    assert!(fx.store.pending_changes().await.is_empty());
}

#[tokio::test]
async fn drain_skip_reasons() {
    let fx = RecordStoreFixture::new(false).await;
    assert_eq!(
        fx.store.drain_pending_changes().await.skip_reason(),
        Some(SkipReason::Offline)
    );
    fx.connectivity.go_online();
    assert_eq!(
        fx.store.drain_pending_changes().await.skip_reason(),
        Some(SkipReason::Empty)
    );
}

#[tokio::test]
async fn clear_offline_data_is_idempotent() {
    let fx = RecordStoreFixture::new(false).await;
    fx.store.create_local(data(json!({"lat": 7.0}))).await;

    fx.store.clear_offline_data().await.unwrap();
    fx.store.clear_offline_data().await.unwrap();

    assert_eq!(fx.store.unsynced_count().await, 0);
    assert!(fx.store.pending_changes().await.is_empty());
    assert!(fx.store.fetch_all().await.records.is_empty());
}

#[tokio::test]
async fn status_summarises_pending_work() {
    let fx = RecordStoreFixture::new(false).await;
    fx.store.create_local(data(json!({"lat": 8.0}))).await;
    fx.store.create_local(data(json!({"lat": 9.0}))).await;

    let status = fx.store.status().await;
    assert!(!status.online);
    assert_eq!(status.unsynced, 2);
    assert_eq!(status.pending_changes, 2);
}

#[tokio::test]
async fn missing_storage_degrades_instead_of_failing() {
    let remote = StubRemote::new();
    let store = OfflineRecordStore::builder(
        COLLECTION,
        Arc::new(UnavailablePersistence::new("disk full")),
        Arc::new(remote.clone()),
        Arc::new(ConnectivityMonitor::new(true)),
    )
    .build();

    assert!(store.initialize().await.is_err());

    let fetched = store.fetch_all().await;
    assert_eq!(fetched.source, FetchSource::None);
    assert!(fetched.records.is_empty());

    let created = store.create_local(data(json!({"lat": 1.0}))).await;
    assert!(!created.success);
    assert_eq!(store.unsynced_count().await, 0);
    assert_eq!(
        store.drain_pending_changes().await.skip_reason(),
        Some(SkipReason::StorageUnavailable)
    );
    assert!(store.clear_offline_data().await.is_ok());
    assert!(remote.calls().await.is_empty());
}

struct CountingProvider {
    opens: AtomicUsize,
    inner: ReadyPersistence,
}

#[async_trait]
impl PersistenceProvider for CountingProvider {
    async fn open(&self) -> Result<Arc<dyn RecordPersistence>, AppError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.open().await
    }
}

#[tokio::test]
async fn concurrent_initialize_opens_storage_once() {
    let pool = memory_pool().await;
    let provider = Arc::new(CountingProvider {
        opens: AtomicUsize::new(0),
        inner: ReadyPersistence::new(Arc::new(SqliteRecordStore::new(pool.get_pool().clone()))),
    });
    let store = Arc::new(
        OfflineRecordStore::builder(
            COLLECTION,
            provider.clone(),
            Arc::new(StubRemote::new()),
            Arc::new(ConnectivityMonitor::new(false)),
        )
        .build(),
    );

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.initialize().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    store.initialize().await.unwrap();

    assert_eq!(provider.opens.load(Ordering::SeqCst), 1);
}

/// Parks the first `update_with_change` until released.
struct GatedPersistence {
    inner: Arc<SqliteRecordStore>,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RecordPersistence for GatedPersistence {
    async fn get_record(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<LocalRecord>, AppError> {
        self.inner.get_record(collection, id).await
    }

    async fn list_records(&self, collection: &str) -> Result<Vec<LocalRecord>, AppError> {
        self.inner.list_records(collection).await
    }

    async fn replace_synced(
        &self,
        collection: &str,
        records: &[LocalRecord],
    ) -> Result<Vec<LocalRecord>, AppError> {
        self.inner.replace_synced(collection, records).await
    }

    async fn put_record(&self, collection: &str, record: &LocalRecord) -> Result<(), AppError> {
        self.inner.put_record(collection, record).await
    }

    async fn write_with_change(
        &self,
        collection: &str,
        record: &LocalRecord,
        change: PendingChangeDraft,
    ) -> Result<PendingChange, AppError> {
        self.inner.write_with_change(collection, record, change).await
    }

    async fn update_with_change(
        &self,
        collection: &str,
        id: &RecordId,
        updates: &RecordData,
        at: DateTime<Utc>,
    ) -> Result<Option<(LocalRecord, PendingChange)>, AppError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.update_with_change(collection, id, updates, at).await
    }

    async fn pending_changes(&self, collection: &str) -> Result<Vec<PendingChange>, AppError> {
        self.inner.pending_changes(collection).await
    }

    async fn reconcile_create(
        &self,
        collection: &str,
        change_id: i64,
        local_id: &RecordId,
        server: &LocalRecord,
    ) -> Result<(), AppError> {
        self.inner
            .reconcile_create(collection, change_id, local_id, server)
            .await
    }

    async fn confirm_update(
        &self,
        collection: &str,
        change_id: i64,
        record_id: &RecordId,
    ) -> Result<(), AppError> {
        self.inner
            .confirm_update(collection, change_id, record_id)
            .await
    }

    async fn record_change_failure(&self, change_id: i64, error: &str) -> Result<(), AppError> {
        self.inner.record_change_failure(change_id, error).await
    }

    async fn unsynced_count(&self, collection: &str) -> Result<u64, AppError> {
        self.inner.unsynced_count(collection).await
    }

    async fn resolve_id(&self, collection: &str, id: &RecordId) -> Result<RecordId, AppError> {
        self.inner.resolve_id(collection, id).await
    }

    async fn clear_collection(&self, collection: &str) -> Result<(), AppError> {
        self.inner.clear_collection(collection).await
    }
}

#[tokio::test]
async fn update_racing_a_reconcile_lands_on_the_server_record() {
    let pool = memory_pool().await;
    let sqlite = Arc::new(SqliteRecordStore::new(pool.get_pool().clone()));
    let gate = Arc::new(GatedPersistence {
        inner: sqlite.clone(),
        armed: AtomicBool::new(false),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let remote = StubRemote::new();
    let connectivity = ConnectivityMonitor::new(false);
    let store = Arc::new(
        OfflineRecordStore::builder(
            COLLECTION,
            Arc::new(ReadyPersistence::new(gate.clone())),
            Arc::new(remote.clone()),
            Arc::new(connectivity.clone()),
        )
        .build(),
    );

    let local_id = store
        .create_local(data(json!({"lat": 1.0})))
        .await
        .record
        .unwrap()
        .id;
    connectivity.go_online();

    // Stop the update between its lookup and its write.
    gate.armed.store(true, Ordering::SeqCst);
    let updating = {
        let store = Arc::clone(&store);
        let local_id = local_id.clone();
        tokio::spawn(async move {
            store
                .update_local(&local_id, data(json!({"note": "hail"})))
                .await
        })
    };
    gate.entered.notified().await;

    let report = store.drain_pending_changes().await.report().cloned().unwrap();
    assert_eq!(report.created, 1);

    gate.release.notify_one();
    let outcome = updating.await.unwrap();
    assert!(outcome.success);
    assert!(!outcome.synced);
    assert_eq!(outcome.record.unwrap().id.as_str(), "srv-1");

    let report = store.drain_pending_changes().await.report().cloned().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(remote.calls().await, vec!["create", "update:srv-1"]);
    assert_eq!(
        remote.record("srv-1").await.unwrap().data.get("note"),
        Some(&json!("hail"))
    );

    let rows: Vec<(String, SyncFlag)> = sqlite
        .list_records(COLLECTION)
        .await
        .unwrap()
        .into_iter()
        .map(|record| (record.id.to_string(), record.synced))
        .collect();
    assert_eq!(rows, vec![("srv-1".to_string(), SyncFlag::Yes)]);
    assert_eq!(store.unsynced_count().await, 0);
    assert!(store.pending_changes().await.is_empty());
    assert!(sqlite
        .get_record(COLLECTION, &local_id)
        .await
        .unwrap()
        .is_none());
}
