use crate::application::ports::{PersistenceProvider, RecordPersistence};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;

/// Hands out a store that is already open, e.g. one sharing the retry queue's pool.
pub struct ReadyPersistence(Arc<dyn RecordPersistence>);

impl ReadyPersistence {
    pub fn new(store: Arc<dyn RecordPersistence>) -> Self {
        Self(store)
    }
}

#[async_trait]
impl PersistenceProvider for ReadyPersistence {
    async fn open(&self) -> Result<Arc<dyn RecordPersistence>, AppError> {
        Ok(Arc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::SqliteRecordStore;

    #[tokio::test]
    async fn every_open_returns_the_shared_store() {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let store: Arc<dyn RecordPersistence> =
            Arc::new(SqliteRecordStore::new(pool.get_pool().clone()));
        let provider = ReadyPersistence::new(Arc::clone(&store));

        let first = provider.open().await.unwrap();
        let second = provider.open().await.unwrap();
        assert!(Arc::ptr_eq(&first, &store));
        assert!(Arc::ptr_eq(&second, &store));
    }
}
