use super::mappers::{datetime_to_timestamp, operation_from_row};
use super::rows::RetryOperationRow;
use crate::application::ports::OperationStore;
use crate::domain::entities::PendingOperation;
use crate::domain::value_objects::OperationId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};

/// SQLite mirror of the retry queue.
pub struct SqliteOperationStore {
    pool: Pool<Sqlite>,
}

impl SqliteOperationStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    async fn load_all(&self) -> Result<Vec<PendingOperation>, AppError> {
        let rows = sqlx::query_as::<_, RetryOperationRow>(
            r#"
            SELECT id, kind, payload, retry_count, next_retry_at, created_at, last_error
            FROM retry_operations
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut operations = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match operation_from_row(row) {
                Ok(operation) => operations.push(operation),
                Err(err) => {
                    tracing::warn!(
                        target: "retry_queue",
                        operation_id = %id,
                        error = %err,
                        "skipping unreadable persisted operation"
                    );
                }
            }
        }
        Ok(operations)
    }

    async fn upsert(&self, operation: &PendingOperation) -> Result<(), AppError> {
        let payload = serde_json::to_string(operation.payload.as_json())
            .map_err(|err| AppError::SerializationError(err.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO retry_operations (
                id, kind, payload, retry_count, next_retry_at, created_at, last_error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                retry_count = excluded.retry_count,
                next_retry_at = excluded.next_retry_at,
                last_error = excluded.last_error
            "#,
        )
        .bind(operation.id.as_str())
        .bind(operation.kind.as_str())
        .bind(&payload)
        .bind(i64::from(operation.retry_count))
        .bind(datetime_to_timestamp(operation.next_retry_at))
        .bind(datetime_to_timestamp(operation.created_at))
        .bind(&operation.last_error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, id: &OperationId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM retry_operations WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM retry_operations")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{OperationKind, OperationPayload};
    use crate::infrastructure::database::ConnectionPool;
    use chrono::{Duration, Utc};
    use serde_json::json;

    async fn store() -> SqliteOperationStore {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        SqliteOperationStore::new(pool.get_pool().clone())
    }

    fn operation(kind: OperationKind) -> PendingOperation {
        let now = Utc::now();
        PendingOperation::new(
            kind,
            OperationPayload::new(json!({"claimId": "c-1"})).unwrap(),
            now,
            now + Duration::seconds(1),
        )
    }

    #[tokio::test]
    async fn load_all_preserves_enqueue_order() {
        let store = store().await;
        let first = operation(OperationKind::PhotoUpload);
        let second = operation(OperationKind::SmsSend);
        store.upsert(&first).await.unwrap();
        store.upsert(&second).await.unwrap();

        // Rewriting the first entry must not move it to the back.
        let mut retried = first.clone();
        retried.retry_count = 2;
        retried.last_error = Some("HTTP 500".into());
        store.upsert(&retried).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[0].retry_count, 2);
        assert_eq!(loaded[0].last_error.as_deref(), Some("HTTP 500"));
        assert_eq!(loaded[1].id, second.id);
    }

    #[tokio::test]
    async fn remove_and_clear_are_idempotent() {
        let store = store().await;
        let op = operation(OperationKind::EmailSend);
        store.upsert(&op).await.unwrap();
        store.remove(&op.id).await.unwrap();
        store.remove(&op.id).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
