use crate::application::ports::ConnectivitySignal;
use crate::shared::events::{EventBus, SyncEvent};
use std::sync::Arc;
use tokio::sync::watch;

/// Process-wide online/offline flag. Cloning shares the same flag.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<bool>>,
    events: Option<EventBus>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
            events: None,
        }
    }

    pub fn with_events(online: bool, events: EventBus) -> Self {
        Self {
            events: Some(events),
            ..Self::new(online)
        }
    }

    /// Returns whether the flag actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(target: "sync::connectivity", online, "connectivity changed");
            if let Some(events) = &self.events {
                events.publish(SyncEvent::ConnectivityChanged { online });
            }
        }
        changed
    }

    pub fn go_online(&self) -> bool {
        self.set_online(true)
    }

    pub fn go_offline(&self) -> bool {
        self.set_online(false)
    }
}

impl ConnectivitySignal for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}
