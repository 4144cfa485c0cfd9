use super::mappers::{millis_to_datetime, queued_action_from_row};
use super::queries::{
    ACTION_COLUMNS, DELETE_TERMINAL_BEFORE, INSERT_ACTION, SELECT_ACTION_BY_ID, placeholders,
};
use super::rows::{QueuedActionRow, StatusCountRow};
use crate::application::ports::action_store::{ActionStore, StatusChange};
use crate::domain::entities::{QueueStats, QueuedAction};
use crate::domain::value_objects::{ActionId, ActionStatus, UserId};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct SqliteActionStore {
    pool: ConnectionPool,
}

impl SqliteActionStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionStore for SqliteActionStore {
    async fn insert(&self, action: &QueuedAction) -> Result<(), AppError> {
        let payload = serde_json::to_string(action.payload.as_json())?;
        let metadata = action
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(INSERT_ACTION)
            .bind(action.id.as_str())
            .bind(action.action_type.as_str())
            .bind(payload)
            .bind(action.user_id.as_str())
            .bind(action.status.as_str())
            .bind(i64::from(action.retry_count))
            .bind(&action.last_error)
            .bind(action.depends_on.as_ref().map(ActionId::as_str))
            .bind(metadata)
            .bind(action.created_at.timestamp_millis())
            .bind(action.updated_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn get(&self, id: &ActionId) -> Result<Option<QueuedAction>, AppError> {
        let row = sqlx::query_as::<_, QueuedActionRow>(SELECT_ACTION_BY_ID)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(queued_action_from_row).transpose()
    }

    async fn transition(
        &self,
        id: &ActionId,
        expected: &[ActionStatus],
        change: StatusChange,
    ) -> Result<Option<QueuedAction>, AppError> {
        if expected.is_empty() {
            return Ok(None);
        }

        let sql = format!(
            "UPDATE queued_actions \
             SET status = ?1, \
                 retry_count = CASE WHEN ?2 THEN 0 ELSE retry_count + ?3 END, \
                 last_error = ?4, updated_at = ?5 \
             WHERE id = ?6 AND status IN ({}) \
             RETURNING {ACTION_COLUMNS}",
            placeholders(7, expected.len())
        );

        let mut query = sqlx::query_as::<_, QueuedActionRow>(&sql)
            .bind(change.to.as_str())
            .bind(change.reset_retry)
            .bind(i64::from(change.increment_retry))
            .bind(change.last_error)
            .bind(change.updated_at.timestamp_millis())
            .bind(id.as_str());
        for status in expected {
            query = query.bind(status.as_str());
        }

        let row = query.fetch_optional(self.pool.get_pool()).await?;
        row.map(queued_action_from_row).transpose()
    }

    async fn list_by_status(
        &self,
        statuses: &[ActionStatus],
        user_id: Option<&UserId>,
    ) -> Result<Vec<QueuedAction>, AppError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let user_clause = if user_id.is_some() {
            format!(" AND user_id = ?{}", statuses.len() + 1)
        } else {
            String::new()
        };
        // rowid keeps insertion order for actions created in the same millisecond
        let sql = format!(
            "SELECT {ACTION_COLUMNS} FROM queued_actions \
             WHERE status IN ({}){user_clause} \
             ORDER BY created_at ASC, rowid ASC",
            placeholders(1, statuses.len())
        );

        let mut query = sqlx::query_as::<_, QueuedActionRow>(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        if let Some(user_id) = user_id {
            query = query.bind(user_id.as_str());
        }

        let rows = query.fetch_all(self.pool.get_pool()).await?;
        rows.into_iter().map(queued_action_from_row).collect()
    }

    async fn stats(&self, user_id: Option<&UserId>) -> Result<QueueStats, AppError> {
        let sql = format!(
            "SELECT status, COUNT(*) AS count, MIN(created_at) AS oldest, MAX(created_at) AS newest \
             FROM queued_actions{} GROUP BY status",
            if user_id.is_some() {
                " WHERE user_id = ?1"
            } else {
                ""
            }
        );

        let mut query = sqlx::query_as::<_, StatusCountRow>(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id.as_str());
        }
        let rows = query.fetch_all(self.pool.get_pool()).await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let count = u64::try_from(row.count).unwrap_or_default();
            match row.status.parse::<ActionStatus>() {
                Ok(ActionStatus::Pending) => {
                    stats.pending = count;
                    stats.oldest_pending_at = row.oldest.map(millis_to_datetime).transpose()?;
                    stats.newest_pending_at = row.newest.map(millis_to_datetime).transpose()?;
                }
                Ok(ActionStatus::Syncing) => stats.syncing = count,
                Ok(ActionStatus::Synced) => stats.synced = count,
                Ok(ActionStatus::Failed) => stats.failed = count,
                Ok(ActionStatus::Cancelled) => stats.cancelled = count,
                Err(err) => {
                    tracing::warn!(status = %row.status, "ignoring unknown status in stats: {err}");
                }
            }
        }
        Ok(stats)
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_TERMINAL_BEFORE)
            .bind(cutoff.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }
}
