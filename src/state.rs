use crate::application::ports::{ConnectivitySignal, CredentialProvider, StaticCredentials};
use crate::application::services::{OfflineRecordStore, RetryQueue, SyncScheduler};
use crate::domain::value_objects::OperationKind;
use crate::infrastructure::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::offline::{ReadyPersistence, SqliteOperationStore, SqliteRecordStore};
use crate::infrastructure::remote::{ApiClient, HttpOperationHandler, HttpRecordRemote};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::events::EventBus;
use crate::shared::metrics::SyncMetrics;
use std::sync::Arc;
use std::time::Duration;

/// Endpoints for the built-in fire-and-forget operation kinds.
fn operation_endpoints() -> [(OperationKind, &'static str); 3] {
    [
        (OperationKind::PhotoUpload, "/api/photos"),
        (OperationKind::SmsSend, "/api/messages/sms"),
        (OperationKind::EmailSend, "/api/messages/email"),
    ]
}

/// Every long-lived service, wired once at start-up.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub events: EventBus,
    pub metrics: Arc<SyncMetrics>,
    pub connectivity: ConnectivityMonitor,
    pub api: ApiClient,
    pub retry_queue: Arc<RetryQueue>,
    pub record_store: Arc<OfflineRecordStore>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().map_err(AppError::ValidationError)?;

        let pool = ConnectionPool::new(&config.database.url, config.database.max_connections).await?;
        pool.migrate().await?;

        let events = EventBus::new(config.sync.event_capacity);
        let metrics = Arc::new(SyncMetrics::default());
        // Assume online until the probe says otherwise.
        let connectivity = ConnectivityMonitor::with_events(true, events.clone());
        let signal: Arc<dyn ConnectivitySignal> = Arc::new(connectivity.clone());

        let credentials: Arc<dyn CredentialProvider> =
            Arc::new(StaticCredentials::new(config.remote.auth_token.clone()));
        let api = ApiClient::from_config(&config.remote, credentials)?;

        let retry_queue = RetryQueue::builder(
            Arc::new(SqliteOperationStore::new(pool.get_pool().clone())),
            Arc::clone(&signal),
        )
        .events(events.clone())
        .metrics(Arc::clone(&metrics))
        .config(config.retry.clone())
        .build();

        for (kind, path) in operation_endpoints() {
            retry_queue.register_handler(kind, HttpOperationHandler::new(api.clone(), path));
        }

        let record_store = Arc::new(
            OfflineRecordStore::builder(
                config.sync.collection.clone(),
                Arc::new(ReadyPersistence::new(Arc::new(SqliteRecordStore::new(
                    pool.get_pool().clone(),
                )))),
                Arc::new(HttpRecordRemote::new(
                    api.clone(),
                    config.remote.records_path.clone(),
                )),
                Arc::clone(&signal),
            )
            .events(events.clone())
            .metrics(Arc::clone(&metrics))
            .build(),
        );

        Ok(Self {
            config,
            pool,
            events,
            metrics,
            connectivity,
            api,
            retry_queue,
            record_store,
        })
    }

    /// Reload persisted work and open the record cache.
    pub async fn start(&self) -> anyhow::Result<()> {
        let restored = self.retry_queue.restore().await?;
        self.record_store.initialize().await?;
        tracing::info!(
            restored,
            unsynced = self.record_store.unsynced_count().await,
            "offline state loaded"
        );
        Ok(())
    }

    pub fn scheduler(&self) -> SyncScheduler {
        SyncScheduler::new(
            Arc::clone(&self.retry_queue),
            vec![Arc::clone(&self.record_store)],
            Arc::new(self.connectivity.clone()),
            Duration::from_secs(self.config.retry.tick_secs),
            Duration::from_secs(self.config.sync.interval_secs),
        )
    }

    pub fn probe(&self) -> ConnectivityProbe {
        ConnectivityProbe::new(
            self.api.clone(),
            self.config.remote.health_path.clone(),
            self.connectivity.clone(),
            Duration::from_secs(self.config.sync.probe_interval_secs),
        )
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}
