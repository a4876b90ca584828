use crate::application::ports::ConnectivitySignal;
use crate::application::services::{OfflineRecordStore, RetryQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const TARGET: &str = "sync::scheduler";

/// Drives both drain loops: on every offline-to-online transition, on the
/// retry tick for the operation queue, and on the sync tick for record stores.
pub struct SyncScheduler {
    retry_queue: Arc<RetryQueue>,
    record_stores: Vec<Arc<OfflineRecordStore>>,
    connectivity: Arc<dyn ConnectivitySignal>,
    retry_tick: Duration,
    sync_interval: Duration,
}

impl SyncScheduler {
    pub fn new(
        retry_queue: Arc<RetryQueue>,
        record_stores: Vec<Arc<OfflineRecordStore>>,
        connectivity: Arc<dyn ConnectivitySignal>,
        retry_tick: Duration,
        sync_interval: Duration,
    ) -> Self {
        Self {
            retry_queue,
            record_stores,
            connectivity,
            retry_tick,
            sync_interval,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut online_rx = self.connectivity.subscribe();
        let mut was_online = *online_rx.borrow_and_update();

        let mut retry_tick = tokio::time::interval(self.retry_tick);
        retry_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sync_tick = tokio::time::interval(self.sync_interval);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately.
        retry_tick.tick().await;
        sync_tick.tick().await;

        tracing::info!(
            target: TARGET,
            stores = self.record_stores.len(),
            retry_tick_secs = self.retry_tick.as_secs(),
            sync_interval_secs = self.sync_interval.as_secs(),
            "sync scheduler started"
        );

        if was_online {
            self.drain_all().await;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        tracing::warn!(target: TARGET, "connectivity source dropped");
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if online && !was_online {
                        tracing::info!(target: TARGET, "back online; draining");
                        self.drain_all().await;
                    }
                    was_online = online;
                }
                _ = retry_tick.tick() => {
                    if self.connectivity.is_online() {
                        let outcome = self.retry_queue.drain().await;
                        tracing::trace!(target: TARGET, ?outcome, "retry tick");
                    }
                }
                _ = sync_tick.tick() => {
                    if self.connectivity.is_online() {
                        self.drain_stores().await;
                    }
                }
            }
        }

        tracing::info!(target: TARGET, "sync scheduler stopped");
    }

    /// One pass over the retry queue and every record store.
    pub async fn drain_all(&self) {
        let outcome = self.retry_queue.drain().await;
        tracing::debug!(target: TARGET, ?outcome, "retry queue drained");
        self.drain_stores().await;
    }

    async fn drain_stores(&self) {
        for store in &self.record_stores {
            let outcome = store.drain_pending_changes().await;
            tracing::debug!(
                target: TARGET,
                collection = store.collection(),
                ?outcome,
                "record store drained"
            );
        }
    }
}
