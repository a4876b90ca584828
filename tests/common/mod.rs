#![allow(dead_code)]

pub mod mocks;

use claimsync::application::ports::RecordPersistence;
use claimsync::application::services::OfflineRecordStore;
use claimsync::domain::value_objects::{OperationPayload, RecordData};
use claimsync::infrastructure::connectivity::ConnectivityMonitor;
use claimsync::infrastructure::database::ConnectionPool;
use claimsync::infrastructure::offline::{ReadyPersistence, SqliteRecordStore};
use claimsync::shared::clock::ManualClock;
use claimsync::shared::events::{EventBus, SyncEvent};
use mocks::StubRemote;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const COLLECTION: &str = "pins";

pub async fn memory_pool() -> ConnectionPool {
    let pool = ConnectionPool::from_memory().await.unwrap();
    pool.migrate().await.unwrap();
    pool
}

pub fn data(value: Value) -> RecordData {
    RecordData::new(value).unwrap()
}

pub fn payload(value: Value) -> OperationPayload {
    OperationPayload::new(value).unwrap()
}

/// Drain every event currently buffered on `rx`.
pub fn collect_events(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub struct RecordStoreFixture {
    pub store: Arc<OfflineRecordStore>,
    pub persistence: Arc<SqliteRecordStore>,
    pub remote: StubRemote,
    pub connectivity: ConnectivityMonitor,
    pub clock: Arc<ManualClock>,
    pub events: EventBus,
}

impl RecordStoreFixture {
    pub async fn new(online: bool) -> Self {
        let pool = memory_pool().await;
        let persistence = Arc::new(SqliteRecordStore::new(pool.get_pool().clone()));
        let shared: Arc<dyn RecordPersistence> = persistence.clone();
        let remote = StubRemote::new();
        let connectivity = ConnectivityMonitor::new(online);
        let clock = Arc::new(ManualClock::default());
        let events = EventBus::new(64);

        let store = Arc::new(
            OfflineRecordStore::builder(
                COLLECTION,
                Arc::new(ReadyPersistence::new(shared)),
                Arc::new(remote.clone()),
                Arc::new(connectivity.clone()),
            )
            .clock(clock.clone())
            .events(events.clone())
            .build(),
        );
        store.initialize().await.unwrap();

        Self {
            store,
            persistence,
            remote,
            connectivity,
            clock,
            events,
        }
    }
}
