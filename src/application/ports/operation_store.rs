use crate::domain::entities::PendingOperation;
use crate::domain::value_objects::OperationId;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable backing for the retry queue. `load_all` returns enqueue order.
#[async_trait]
pub trait OperationStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<PendingOperation>, AppError>;
    async fn upsert(&self, operation: &PendingOperation) -> Result<(), AppError>;
    async fn remove(&self, id: &OperationId) -> Result<(), AppError>;
    async fn clear(&self) -> Result<(), AppError>;
}
