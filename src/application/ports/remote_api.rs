use crate::domain::entities::RemoteRecord;
use crate::domain::value_objects::{RecordData, RecordId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote unreachable: {0}")]
    Network(String),

    #[error("Remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Remote response could not be decoded: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Network failures, 5xx and 429 are worth retrying; other 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Decode(_) => false,
        }
    }
}

/// REST collection endpoint for one record type.
#[async_trait]
pub trait RecordRemote: Send + Sync {
    async fn list(&self) -> Result<Vec<RemoteRecord>, RemoteError>;
    async fn create(&self, record: &RecordData) -> Result<RemoteRecord, RemoteError>;
    async fn update(&self, id: &RecordId, updates: &RecordData)
    -> Result<RemoteRecord, RemoteError>;
}
