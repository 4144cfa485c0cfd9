use super::mappers::reference_entry_from_row;
use super::queries::{
    DELETE_EXPIRED_REFERENCES, SELECT_REFERENCE_COLLECTION, SELECT_REFERENCE_ENTRY,
    UPSERT_REFERENCE_ENTRY,
};
use super::rows::ReferenceEntryRow;
use crate::application::ports::reference_cache::ReferenceCache;
use crate::domain::entities::ReferenceEntry;
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct SqliteReferenceCache {
    pool: ConnectionPool,
}

impl SqliteReferenceCache {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceCache for SqliteReferenceCache {
    async fn put(&self, entry: &ReferenceEntry) -> Result<(), AppError> {
        let data = serde_json::to_string(&entry.data)?;

        sqlx::query(UPSERT_REFERENCE_ENTRY)
            .bind(&entry.collection)
            .bind(&entry.key)
            .bind(data)
            .bind(entry.cached_at.timestamp_millis())
            .bind(entry.expires_at.map(|expiry| expiry.timestamp_millis()))
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<ReferenceEntry>, AppError> {
        let row = sqlx::query_as::<_, ReferenceEntryRow>(SELECT_REFERENCE_ENTRY)
            .bind(collection)
            .bind(key)
            .bind(Utc::now().timestamp_millis())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(reference_entry_from_row).transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<ReferenceEntry>, AppError> {
        let rows = sqlx::query_as::<_, ReferenceEntryRow>(SELECT_REFERENCE_COLLECTION)
            .bind(collection)
            .bind(Utc::now().timestamp_millis())
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(reference_entry_from_row).collect()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_EXPIRED_REFERENCES)
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }
}
