use super::mappers::{
    change_body_to_json, change_from_row, datetime_to_timestamp, record_data_to_json,
    record_from_row,
};
use super::rows::{LocalRecordRow, PendingChangeRow};
use crate::application::ports::RecordPersistence;
use crate::domain::entities::{LocalRecord, PendingChange, PendingChangeDraft};
use crate::domain::value_objects::{RecordData, RecordId, SyncFlag};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqliteConnection};

/// SQLite-backed record cache and pending-change log.
///
/// Methods that touch more than one table run in a single transaction and
/// only ever use the transaction's connection.
pub struct SqliteRecordStore {
    pool: Pool<Sqlite>,
}

impl SqliteRecordStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

async fn upsert_record(
    conn: &mut SqliteConnection,
    collection: &str,
    record: &LocalRecord,
) -> Result<(), AppError> {
    let data = record_data_to_json(&record.data)?;
    sqlx::query(
        r#"
        INSERT INTO local_records (collection, id, synced, data, cached_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(collection, id) DO UPDATE SET
            synced = excluded.synced,
            data = excluded.data,
            cached_at = excluded.cached_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(collection)
    .bind(record.id.as_str())
    .bind(record.synced.as_str())
    .bind(&data)
    .bind(datetime_to_timestamp(record.cached_at))
    .bind(datetime_to_timestamp(record.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

async fn fetch_record(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &RecordId,
) -> Result<Option<LocalRecord>, AppError> {
    let row = sqlx::query_as::<_, LocalRecordRow>(
        r#"
        SELECT id, synced, data, cached_at, updated_at
        FROM local_records
        WHERE collection = ?1 AND id = ?2
        "#,
    )
    .bind(collection)
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;
    row.map(record_from_row).transpose()
}

async fn pending_for_record(
    conn: &mut SqliteConnection,
    collection: &str,
    record_id: &RecordId,
) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pending_changes WHERE collection = ?1 AND record_id = ?2",
    )
    .bind(collection)
    .bind(record_id.as_str())
    .fetch_one(conn)
    .await?;
    Ok(count)
}

async fn append_change(
    conn: &mut SqliteConnection,
    collection: &str,
    change: PendingChangeDraft,
) -> Result<PendingChange, AppError> {
    let body = change_body_to_json(&change.body)?;
    let result = sqlx::query(
        r#"
        INSERT INTO pending_changes (collection, action, record_id, body, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(collection)
    .bind(change.body.action().as_str())
    .bind(change.record_id.as_str())
    .bind(&body)
    .bind(datetime_to_timestamp(change.created_at))
    .execute(conn)
    .await?;

    Ok(PendingChange {
        id: result.last_insert_rowid(),
        record_id: change.record_id,
        body: change.body,
        created_at: change.created_at,
        attempts: 0,
        last_error: None,
    })
}

async fn resolve_alias(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &RecordId,
) -> Result<RecordId, AppError> {
    if !id.is_local() {
        return Ok(id.clone());
    }
    let server_id: Option<(String,)> = sqlx::query_as(
        "SELECT server_id FROM record_aliases WHERE collection = ?1 AND local_id = ?2",
    )
    .bind(collection)
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;

    match server_id {
        Some((server_id,)) => RecordId::new(server_id).map_err(AppError::DeserializationError),
        None => Ok(id.clone()),
    }
}

#[async_trait]
impl RecordPersistence for SqliteRecordStore {
    async fn get_record(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<LocalRecord>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_record(&mut conn, collection, id).await
    }

    async fn list_records(&self, collection: &str) -> Result<Vec<LocalRecord>, AppError> {
        let rows = sqlx::query_as::<_, LocalRecordRow>(
            r#"
            SELECT id, synced, data, cached_at, updated_at
            FROM local_records
            WHERE collection = ?1
            ORDER BY cached_at ASC, id ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(record_from_row).collect()
    }

    async fn replace_synced(
        &self,
        collection: &str,
        records: &[LocalRecord],
    ) -> Result<Vec<LocalRecord>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM local_records WHERE collection = ?1 AND synced = ?2")
            .bind(collection)
            .bind(SyncFlag::Yes.as_str())
            .execute(&mut *tx)
            .await?;

        for record in records {
            let data = record_data_to_json(&record.data)?;
            // Unsynced local copies shadow the server copy.
            sqlx::query(
                r#"
                INSERT INTO local_records (collection, id, synced, data, cached_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(collection, id) DO NOTHING
                "#,
            )
            .bind(collection)
            .bind(record.id.as_str())
            .bind(SyncFlag::Yes.as_str())
            .bind(&data)
            .bind(datetime_to_timestamp(record.cached_at))
            .bind(datetime_to_timestamp(record.updated_at))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.list_records(collection).await
    }

    async fn put_record(&self, collection: &str, record: &LocalRecord) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        upsert_record(&mut conn, collection, record).await
    }

    async fn write_with_change(
        &self,
        collection: &str,
        record: &LocalRecord,
        change: PendingChangeDraft,
    ) -> Result<PendingChange, AppError> {
        let mut tx = self.pool.begin().await?;
        upsert_record(&mut tx, collection, record).await?;
        let change = append_change(&mut tx, collection, change).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn update_with_change(
        &self,
        collection: &str,
        id: &RecordId,
        updates: &RecordData,
        at: DateTime<Utc>,
    ) -> Result<Option<(LocalRecord, PendingChange)>, AppError> {
        let mut tx = self.pool.begin().await?;
        // A reconcile may have committed since the caller looked the id up.
        let id = resolve_alias(&mut tx, collection, id).await?;
        let Some(mut record) = fetch_record(&mut tx, collection, &id).await? else {
            return Ok(None);
        };
        record.data.merge(updates);
        record.synced = SyncFlag::No;
        record.updated_at = at;

        upsert_record(&mut tx, collection, &record).await?;
        let change = append_change(
            &mut tx,
            collection,
            PendingChangeDraft::update(id, updates.clone(), at),
        )
        .await?;
        tx.commit().await?;
        Ok(Some((record, change)))
    }

    async fn pending_changes(&self, collection: &str) -> Result<Vec<PendingChange>, AppError> {
        let rows = sqlx::query_as::<_, PendingChangeRow>(
            r#"
            SELECT id, record_id, body, created_at, attempts, last_error
            FROM pending_changes
            WHERE collection = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(change_from_row).collect()
    }

    async fn reconcile_create(
        &self,
        collection: &str,
        change_id: i64,
        local_id: &RecordId,
        server: &LocalRecord,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pending_changes WHERE id = ?1")
            .bind(change_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            UPDATE pending_changes SET record_id = ?1
            WHERE collection = ?2 AND record_id = ?3
            "#,
        )
        .bind(server.id.as_str())
        .bind(collection)
        .bind(local_id.as_str())
        .execute(&mut *tx)
        .await?;

        // Local edits made after the create are newer than the server copy.
        let mut record = server.clone();
        if let Some(local) = fetch_record(&mut tx, collection, local_id).await? {
            record.data.merge(&local.data);
        }
        if pending_for_record(&mut tx, collection, &server.id).await? > 0 {
            record.synced = SyncFlag::No;
        }

        sqlx::query("DELETE FROM local_records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(local_id.as_str())
            .execute(&mut *tx)
            .await?;
        upsert_record(&mut tx, collection, &record).await?;

        sqlx::query(
            r#"
            INSERT INTO record_aliases (collection, local_id, server_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(collection, local_id) DO UPDATE SET server_id = excluded.server_id
            "#,
        )
        .bind(collection)
        .bind(local_id.as_str())
        .bind(server.id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn confirm_update(
        &self,
        collection: &str,
        change_id: i64,
        record_id: &RecordId,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM pending_changes WHERE id = ?1")
            .bind(change_id)
            .execute(&mut *tx)
            .await?;

        if pending_for_record(&mut tx, collection, record_id).await? == 0 {
            sqlx::query(
                "UPDATE local_records SET synced = ?1 WHERE collection = ?2 AND id = ?3",
            )
            .bind(SyncFlag::Yes.as_str())
            .bind(collection)
            .bind(record_id.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_change_failure(&self, change_id: i64, error: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE pending_changes SET attempts = attempts + 1, last_error = ?1 WHERE id = ?2",
        )
        .bind(error)
        .bind(change_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unsynced_count(&self, collection: &str) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM local_records WHERE collection = ?1 AND synced = ?2",
        )
        .bind(collection)
        .bind(SyncFlag::No.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn resolve_id(&self, collection: &str, id: &RecordId) -> Result<RecordId, AppError> {
        let mut conn = self.pool.acquire().await?;
        resolve_alias(&mut conn, collection, id).await
    }

    async fn clear_collection(&self, collection: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for statement in [
            "DELETE FROM local_records WHERE collection = ?1",
            "DELETE FROM pending_changes WHERE collection = ?1",
            "DELETE FROM record_aliases WHERE collection = ?1",
        ] {
            sqlx::query(statement)
                .bind(collection)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
