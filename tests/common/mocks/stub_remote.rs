use async_trait::async_trait;
use claimsync::application::ports::{RecordRemote, RemoteError};
use claimsync::domain::entities::RemoteRecord;
use claimsync::domain::value_objects::{RecordData, RecordId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StubState {
    records: Vec<RemoteRecord>,
    next_id: u64,
    unreachable: bool,
    failing_creates: bool,
    failing_updates: HashSet<String>,
    calls: Vec<String>,
}

/// In-memory REST collection. Assigns ids `srv-1`, `srv-2`, ...
#[derive(Debug, Clone, Default)]
pub struct StubRemote {
    state: Arc<RwLock<StubState>>,
}

impl StubRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, id: &str, data: RecordData) {
        self.state.write().await.records.push(RemoteRecord {
            id: RecordId::parse(id).unwrap(),
            data,
        });
    }

    /// Every call fails with a network error.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }

    pub async fn set_failing_creates(&self, failing: bool) {
        self.state.write().await.failing_creates = failing;
    }

    pub async fn fail_updates_for(&self, id: &str) {
        self.state
            .write()
            .await
            .failing_updates
            .insert(id.to_string());
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    pub async fn record(&self, id: &str) -> Option<RemoteRecord> {
        self.state
            .read()
            .await
            .records
            .iter()
            .find(|record| record.id.as_str() == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl RecordRemote for StubRemote {
    async fn list(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        let mut state = self.state.write().await;
        state.calls.push("list".to_string());
        if state.unreachable {
            return Err(RemoteError::Network("connection refused".into()));
        }
        Ok(state.records.clone())
    }

    async fn create(&self, record: &RecordData) -> Result<RemoteRecord, RemoteError> {
        let mut state = self.state.write().await;
        state.calls.push("create".to_string());
        if state.unreachable {
            return Err(RemoteError::Network("connection refused".into()));
        }
        if state.failing_creates {
            return Err(RemoteError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        state.next_id += 1;
        let created = RemoteRecord {
            id: RecordId::new(format!("srv-{}", state.next_id)).unwrap(),
            data: record.clone(),
        };
        state.records.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: &RecordId,
        updates: &RecordData,
    ) -> Result<RemoteRecord, RemoteError> {
        let mut state = self.state.write().await;
        state.calls.push(format!("update:{id}"));
        if state.unreachable {
            return Err(RemoteError::Network("connection refused".into()));
        }
        if state.failing_updates.contains(id.as_str()) {
            return Err(RemoteError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        let Some(existing) = state.records.iter_mut().find(|record| &record.id == id) else {
            return Err(RemoteError::Status {
                status: 404,
                body: format!("no record {id}"),
            });
        };
        existing.data.merge(updates);
        Ok(existing.clone())
    }
}
