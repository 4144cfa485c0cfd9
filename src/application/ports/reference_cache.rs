use crate::domain::entities::ReferenceEntry;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Write-through cache of read-only reference documents (schools, session
/// history).
#[async_trait]
pub trait ReferenceCache: Send + Sync {
    async fn put(&self, entry: &ReferenceEntry) -> Result<(), AppError>;

    /// Expired entries read as missing.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<ReferenceEntry>, AppError>;

    async fn list(&self, collection: &str) -> Result<Vec<ReferenceEntry>, AppError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
