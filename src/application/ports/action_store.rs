use crate::domain::entities::{QueueStats, QueuedAction};
use crate::domain::value_objects::{ActionId, ActionStatus, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Column changes applied together with a status transition.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub to: ActionStatus,
    pub increment_retry: bool,
    pub reset_retry: bool,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StatusChange {
    pub fn to(status: ActionStatus) -> Self {
        Self {
            to: status,
            increment_retry: false,
            reset_retry: false,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn counting_attempt(mut self) -> Self {
        self.increment_retry = true;
        self
    }

    pub fn resetting_attempts(mut self) -> Self {
        self.reset_retry = true;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }
}

/// Durable local storage of queued actions. Every method is a single atomic
/// read or read-modify-write on the store.
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn insert(&self, action: &QueuedAction) -> Result<(), AppError>;

    async fn get(&self, id: &ActionId) -> Result<Option<QueuedAction>, AppError>;

    /// Applies `change` only if the action currently is in one of `expected`.
    /// Returns the updated action, or `None` when no row matched.
    async fn transition(
        &self,
        id: &ActionId,
        expected: &[ActionStatus],
        change: StatusChange,
    ) -> Result<Option<QueuedAction>, AppError>;

    /// Actions in any of `statuses`, oldest `created_at` first.
    async fn list_by_status(
        &self,
        statuses: &[ActionStatus],
        user_id: Option<&UserId>,
    ) -> Result<Vec<QueuedAction>, AppError>;

    async fn stats(&self, user_id: Option<&UserId>) -> Result<QueueStats, AppError>;

    /// Deletes `synced`/`cancelled` actions last updated before `cutoff`.
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
