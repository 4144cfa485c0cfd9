use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct QueuedActionRow {
    pub id: String,
    pub action_type: String,
    pub payload: String,
    pub user_id: String,
    pub status: String,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub depends_on: Option<String>,
    pub metadata: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StatusCountRow {
    pub status: String,
    pub count: i64,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReferenceEntryRow {
    pub collection: String,
    pub cache_key: String,
    pub data: String,
    pub cached_at: i64,
    pub expires_at: Option<i64>,
}
