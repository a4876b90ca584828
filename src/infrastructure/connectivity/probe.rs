use super::monitor::ConnectivityMonitor;
use crate::infrastructure::remote::ApiClient;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodically pings the API and feeds the result into a [`ConnectivityMonitor`].
pub struct ConnectivityProbe {
    api: ApiClient,
    health_path: String,
    monitor: ConnectivityMonitor,
    interval: Duration,
}

impl ConnectivityProbe {
    pub fn new(
        api: ApiClient,
        health_path: impl Into<String>,
        monitor: ConnectivityMonitor,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            health_path: health_path.into(),
            monitor,
            interval,
        }
    }

    pub async fn check_once(&self) -> bool {
        let online = self.api.ping(&self.health_path).await;
        self.monitor.set_online(online);
        online
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.check_once().await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            tracing::debug!(target: "sync::connectivity", "connectivity probe stopped");
        })
    }
}
