use crate::application::ports::{ConnectivitySignal, OperationHandler, OperationStore};
use crate::domain::entities::{DrainOutcome, PendingOperation, RetryDrainReport, SkipReason};
use crate::domain::value_objects::{OperationId, OperationKind, OperationPayload};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::config::RetryConfig;
use crate::shared::error::AppError;
use crate::shared::events::{EventBus, SyncEvent};
use crate::shared::metrics::SyncMetrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

const TARGET: &str = "retry_queue";
// Timers and the wall clock can disagree by a tick.
const SCHEDULE_SLACK: Duration = Duration::from_millis(10);

/// Durable best-effort delivery of fire-and-forget mutations.
///
/// Operations are kept in enqueue order in memory and mirrored to an
/// [`OperationStore`] after every mutation. Delivery is at-least-once and
/// bounded by `max_retries` attempts.
pub struct RetryQueue {
    store: Arc<dyn OperationStore>,
    connectivity: Arc<dyn ConnectivitySignal>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    metrics: Arc<SyncMetrics>,
    config: RetryConfig,
    queue: Mutex<Vec<PendingOperation>>,
    handlers: RwLock<HashMap<OperationKind, Arc<dyn OperationHandler>>>,
    draining: AtomicBool,
    this: Weak<RetryQueue>,
}

pub struct RetryQueueBuilder {
    store: Arc<dyn OperationStore>,
    connectivity: Arc<dyn ConnectivitySignal>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    metrics: Arc<SyncMetrics>,
    config: RetryConfig,
}

impl RetryQueueBuilder {
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

    pub fn config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<RetryQueue> {
        Arc::new_cyclic(|this| RetryQueue {
            store: self.store,
            connectivity: self.connectivity,
            clock: self.clock,
            events: self.events,
            metrics: self.metrics,
            config: self.config,
            queue: Mutex::new(Vec::new()),
            handlers: RwLock::new(HashMap::new()),
            draining: AtomicBool::new(false),
            this: this.clone(),
        })
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RetryQueue {
    pub fn builder(
        store: Arc<dyn OperationStore>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> RetryQueueBuilder {
        RetryQueueBuilder {
            store,
            connectivity,
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
            metrics: Arc::new(SyncMetrics::default()),
            config: RetryConfig::default(),
        }
    }

    /// Reload persisted operations, e.g. after a restart. Returns how many were loaded.
    pub async fn restore(&self) -> Result<usize, AppError> {
        let persisted = self.store.load_all().await?;
        let count = persisted.len();
        {
            let mut queue = self.lock_queue();
            let known: Vec<OperationId> = queue.iter().map(|op| op.id.clone()).collect();
            let mut restored: Vec<PendingOperation> = persisted
                .into_iter()
                .filter(|op| !known.contains(&op.id))
                .collect();
            restored.append(&mut queue);
            *queue = restored;
        }
        tracing::info!(target: TARGET, restored = count, "retry queue restored");
        if count > 0 {
            self.schedule_drain(self.config.initial_delay());
        }
        Ok(count)
    }

    /// Enqueue an operation. Never needs the network.
    pub async fn add(&self, kind: OperationKind, payload: OperationPayload) -> OperationId {
        let now = self.clock.now();
        let operation = PendingOperation::new(
            kind,
            payload,
            now,
            add_delay(now, self.config.initial_delay()),
        );
        let id = operation.id.clone();

        let pending = {
            let mut queue = self.lock_queue();
            queue.push(operation.clone());
            queue.len()
        };
        self.persist(&operation).await;

        tracing::debug!(
            target: TARGET,
            operation_id = %id,
            kind = %operation.kind,
            "operation enqueued"
        );
        self.events.publish(SyncEvent::RetryQueueChanged { pending });
        self.schedule_drain(self.config.initial_delay());
        id
    }

    /// Drop an operation unconditionally. Idempotent.
    pub async fn remove(&self, id: &OperationId) {
        let removed = self.remove_entry(id);
        if let Err(err) = self.store.remove(id).await {
            tracing::warn!(
                target: TARGET,
                operation_id = %id,
                error = %err,
                "failed to remove persisted operation"
            );
        }
        if removed {
            self.events.publish(SyncEvent::RetryQueueChanged {
                pending: self.pending_count(None),
            });
        }
    }

    pub fn register_handler<H>(&self, kind: OperationKind, handler: H)
    where
        H: OperationHandler + 'static,
    {
        self.register_shared_handler(kind, Arc::new(handler));
    }

    pub fn register_shared_handler(&self, kind: OperationKind, handler: Arc<dyn OperationHandler>) {
        tracing::debug!(target: TARGET, kind = %kind, "handler registered");
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kind, handler);
    }

    pub fn unregister_handler(&self, kind: &OperationKind) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(kind)
            .is_some()
    }

    pub fn has_handler(&self, kind: &OperationKind) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(kind)
    }

    pub fn pending_count(&self, kind: Option<&OperationKind>) -> usize {
        let queue = self.lock_queue();
        match kind {
            Some(kind) => queue.iter().filter(|op| &op.kind == kind).count(),
            None => queue.len(),
        }
    }

    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.lock_queue().clone()
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        self.lock_queue().clear();
        self.store.clear().await?;
        self.events
            .publish(SyncEvent::RetryQueueChanged { pending: 0 });
        Ok(())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Deliver every due operation through its handler, in enqueue order.
    ///
    /// A call that arrives while another drain is running returns
    /// [`SkipReason::AlreadyDraining`] without waiting.
    pub async fn drain(&self) -> DrainOutcome<RetryDrainReport> {
        if !self.connectivity.is_online() {
            return DrainOutcome::Skipped(SkipReason::Offline);
        }
        if self.draining.swap(true, Ordering::AcqRel) {
            return DrainOutcome::Skipped(SkipReason::AlreadyDraining);
        }
        let _guard = DrainGuard(&self.draining);

        let now = self.clock.now();
        let due: Vec<PendingOperation> = {
            let queue = self.lock_queue();
            if queue.is_empty() {
                return DrainOutcome::Skipped(SkipReason::Empty);
            }
            queue.iter().filter(|op| op.is_due(now)).cloned().collect()
        };

        let mut report = RetryDrainReport::default();
        for operation in due {
            if !self.connectivity.is_online() {
                tracing::info!(target: TARGET, "went offline mid-drain; stopping");
                break;
            }
            if !self.contains(&operation.id) {
                continue;
            }

            let handler = self
                .handlers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(&operation.kind)
                .cloned();
            let Some(handler) = handler else {
                tracing::debug!(
                    target: TARGET,
                    operation_id = %operation.id,
                    kind = %operation.kind,
                    "no handler registered; leaving operation queued"
                );
                report.missing_handler += 1;
                continue;
            };

            report.attempted += 1;
            match handler.handle(&operation.payload).await {
                Ok(()) => {
                    self.remove_entry(&operation.id);
                    if let Err(err) = self.store.remove(&operation.id).await {
                        tracing::warn!(
                            target: TARGET,
                            operation_id = %operation.id,
                            error = %err,
                            "failed to remove delivered operation from storage"
                        );
                    }
                    self.metrics.operations.record_success();
                    report.succeeded += 1;
                    tracing::debug!(
                        target: TARGET,
                        operation_id = %operation.id,
                        "operation delivered"
                    );
                }
                Err(err) => {
                    self.metrics.operations.record_failure();
                    let retry_count = operation.retry_count + 1;
                    let message = err.to_string();

                    if err.is_permanent() || retry_count >= self.config.max_retries {
                        let mut failed = operation.clone();
                        failed.retry_count = retry_count;
                        failed.last_error = Some(message.clone());
                        self.discard(failed, message).await;
                        report.discarded += 1;
                    } else {
                        let delay = self.config.backoff_for(retry_count);
                        let next_retry_at = add_delay(self.clock.now(), delay);
                        let updated = self.update_entry(&operation.id, |op| {
                            op.retry_count = retry_count;
                            op.next_retry_at = next_retry_at;
                            op.last_error = Some(message.clone());
                        });
                        if let Some(updated) = updated {
                            self.persist(&updated).await;
                        }
                        tracing::warn!(
                            target: TARGET,
                            operation_id = %operation.id,
                            retry_count,
                            max_retries = self.config.max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            error = %message,
                            "operation failed; retrying after backoff"
                        );
                        self.schedule_drain(delay);
                        report.rescheduled += 1;
                    }
                }
            }
        }

        report.remaining = self.pending_count(None);
        self.events.publish(SyncEvent::RetryQueueChanged {
            pending: report.remaining,
        });
        DrainOutcome::Completed(report)
    }

    async fn discard(&self, operation: PendingOperation, error: String) {
        self.remove_entry(&operation.id);
        if let Err(err) = self.store.remove(&operation.id).await {
            tracing::warn!(
                target: TARGET,
                operation_id = %operation.id,
                error = %err,
                "failed to remove discarded operation from storage"
            );
        }
        self.metrics.record_discard();
        tracing::error!(
            target: TARGET,
            operation_id = %operation.id,
            kind = %operation.kind,
            retry_count = operation.retry_count,
            error = %error,
            "operation permanently failed"
        );
        self.events
            .publish(SyncEvent::RetryQueueFailed { operation, error });
    }

    async fn persist(&self, operation: &PendingOperation) {
        if let Err(err) = self.store.upsert(operation).await {
            tracing::warn!(
                target: TARGET,
                operation_id = %operation.id,
                error = %err,
                "failed to persist operation; keeping it in memory"
            );
        }
    }

    fn schedule_drain(&self, delay: Duration) {
        if !self.config.schedule_drains {
            return;
        }
        let Some(queue) = self.this.upgrade() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay + SCHEDULE_SLACK).await;
                    queue.drain().await;
                });
            }
            Err(_) => {
                tracing::debug!(target: TARGET, "no async runtime; relying on periodic drain");
            }
        }
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Vec<PendingOperation>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn contains(&self, id: &OperationId) -> bool {
        self.lock_queue().iter().any(|op| &op.id == id)
    }

    fn remove_entry(&self, id: &OperationId) -> bool {
        let mut queue = self.lock_queue();
        let before = queue.len();
        queue.retain(|op| &op.id != id);
        queue.len() != before
    }

    fn update_entry<F>(&self, id: &OperationId, apply: F) -> Option<PendingOperation>
    where
        F: FnOnce(&mut PendingOperation),
    {
        let mut queue = self.lock_queue();
        let op = queue.iter_mut().find(|op| &op.id == id)?;
        apply(op);
        Some(op.clone())
    }
}

fn add_delay(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
