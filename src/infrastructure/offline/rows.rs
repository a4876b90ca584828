use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RetryOperationRow {
    pub id: String,
    pub kind: String,
    pub payload: String,
    pub retry_count: i64,
    pub next_retry_at: i64,
    pub created_at: i64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LocalRecordRow {
    pub id: String,
    pub synced: String,
    pub data: String,
    pub cached_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PendingChangeRow {
    pub id: i64,
    pub record_id: String,
    pub body: String,
    pub created_at: i64,
    pub attempts: i64,
    pub last_error: Option<String>,
}
