use async_trait::async_trait;
use claimsync::application::ports::{PersistenceProvider, RecordPersistence};
use claimsync::shared::error::AppError;
use std::sync::Arc;

/// Storage that can never be opened.
pub struct UnavailablePersistence {
    reason: String,
}

impl UnavailablePersistence {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PersistenceProvider for UnavailablePersistence {
    async fn open(&self) -> Result<Arc<dyn RecordPersistence>, AppError> {
        Err(AppError::Storage(self.reason.clone()))
    }
}
