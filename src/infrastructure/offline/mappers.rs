use super::rows::{LocalRecordRow, PendingChangeRow, RetryOperationRow};
use crate::domain::entities::{ChangeBody, LocalRecord, PendingChange, PendingOperation};
use crate::domain::value_objects::{
    OperationId, OperationKind, OperationPayload, RecordData, RecordId, SyncFlag,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub fn timestamp_to_datetime(millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        AppError::DeserializationError(format!("Invalid timestamp: {millis}"))
    })
}

pub fn datetime_to_timestamp(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn operation_from_row(row: RetryOperationRow) -> Result<PendingOperation, AppError> {
    let id = OperationId::parse(&row.id).map_err(AppError::DeserializationError)?;
    let payload =
        OperationPayload::from_json_str(&row.payload).map_err(AppError::DeserializationError)?;
    Ok(PendingOperation {
        id,
        kind: OperationKind::from(row.kind),
        payload,
        retry_count: u32::try_from(row.retry_count).unwrap_or(0),
        next_retry_at: timestamp_to_datetime(row.next_retry_at)?,
        created_at: timestamp_to_datetime(row.created_at)?,
        last_error: row.last_error,
    })
}

pub fn record_from_row(row: LocalRecordRow) -> Result<LocalRecord, AppError> {
    let id = RecordId::new(row.id).map_err(AppError::DeserializationError)?;
    let synced = SyncFlag::try_from(row.synced.as_str()).map_err(AppError::DeserializationError)?;
    let data = RecordData::new(serde_json::from_str(&row.data)?)
        .map_err(AppError::DeserializationError)?;
    Ok(LocalRecord {
        id,
        synced,
        data,
        cached_at: timestamp_to_datetime(row.cached_at)?,
        updated_at: timestamp_to_datetime(row.updated_at)?,
    })
}

pub fn change_from_row(row: PendingChangeRow) -> Result<PendingChange, AppError> {
    let record_id = RecordId::new(row.record_id).map_err(AppError::DeserializationError)?;
    let body: ChangeBody = serde_json::from_str(&row.body)?;
    Ok(PendingChange {
        id: row.id,
        record_id,
        body,
        created_at: timestamp_to_datetime(row.created_at)?,
        attempts: u32::try_from(row.attempts).unwrap_or(0),
        last_error: row.last_error,
    })
}

pub fn record_data_to_json(data: &RecordData) -> Result<String, AppError> {
    serde_json::to_string(data).map_err(|err| AppError::SerializationError(err.to_string()))
}

pub fn change_body_to_json(body: &ChangeBody) -> Result<String, AppError> {
    serde_json::to_string(body).map_err(|err| AppError::SerializationError(err.to_string()))
}
