use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::entities::PendingOperation;

/// Notifications for whatever layer renders sync state.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    #[serde(rename_all = "camelCase")]
    RetryQueueFailed {
        operation: PendingOperation,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    RetryQueueChanged { pending: usize },
    #[serde(rename_all = "camelCase")]
    RecordsChanged { collection: String, unsynced: u64 },
    #[serde(rename_all = "camelCase")]
    RecordReconciled {
        collection: String,
        local_id: String,
        server_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ConnectivityChanged { online: bool },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        // No receivers is the normal headless case.
        if self.sender.send(event).is_err() {
            tracing::trace!(target: "sync::events", "no subscribers for sync event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
