use crate::application::ports::action_store::{ActionStore, StatusChange};
use crate::domain::entities::{
    CancelOutcome, QueueStats, QueuedAction, QueuedActionDraft, TransitionOutcome,
};
use crate::domain::value_objects::{ActionId, ActionStatus, ActionType, UserId};
use crate::shared::error::AppError;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// CRUD and status transitions over queued actions.
pub struct ActionQueue {
    store: Arc<dyn ActionStore>,
    retention: Duration,
}

impl ActionQueue {
    pub fn new(store: Arc<dyn ActionStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Persists a new `pending` action. Pure local write.
    pub async fn enqueue(&self, draft: QueuedActionDraft) -> Result<ActionId, AppError> {
        let action = QueuedAction::from_draft(draft, Utc::now());
        self.store.insert(&action).await.map_err(|err| match err {
            AppError::Database(msg) => AppError::Storage(msg),
            other => other,
        })?;

        tracing::debug!(
            action_id = %action.id,
            action_type = %action.action_type,
            user_id = %action.user_id,
            depends_on = ?action.depends_on.as_ref().map(ActionId::as_str),
            "action enqueued"
        );
        Ok(action.id)
    }

    pub async fn get(&self, id: &ActionId) -> Result<Option<QueuedAction>, AppError> {
        self.store.get(id).await
    }

    /// `pending` and `failed` actions, oldest first.
    pub async fn list_pending(&self, user_id: Option<&UserId>) -> Result<Vec<QueuedAction>, AppError> {
        self.store
            .list_by_status(&[ActionStatus::Pending, ActionStatus::Failed], user_id)
            .await
    }

    /// Actions a drain pass may send right now (`pending` only), oldest first.
    pub async fn list_eligible(&self) -> Result<Vec<QueuedAction>, AppError> {
        self.store
            .list_by_status(&[ActionStatus::Pending], None)
            .await
    }

    pub async fn list_failed(&self, user_id: Option<&UserId>) -> Result<Vec<QueuedAction>, AppError> {
        self.store
            .list_by_status(&[ActionStatus::Failed], user_id)
            .await
    }

    /// Latest not-yet-synced check-in for `session_id`, if any.
    pub async fn find_outstanding_check_in(
        &self,
        session_id: &str,
    ) -> Result<Option<QueuedAction>, AppError> {
        let outstanding = self
            .store
            .list_by_status(
                &[
                    ActionStatus::Pending,
                    ActionStatus::Syncing,
                    ActionStatus::Failed,
                ],
                None,
            )
            .await?;

        Ok(outstanding.into_iter().rev().find(|action| {
            action.action_type == ActionType::CheckIn && action.session_id() == Some(session_id)
        }))
    }

    pub async fn mark_syncing(&self, id: &ActionId) -> Result<TransitionOutcome, AppError> {
        self.apply(id, StatusChange::to(ActionStatus::Syncing)).await
    }

    pub async fn mark_synced(&self, id: &ActionId) -> Result<TransitionOutcome, AppError> {
        self.apply(id, StatusChange::to(ActionStatus::Synced)).await
    }

    /// `syncing -> failed` without counting another attempt.
    pub async fn mark_failed(
        &self,
        id: &ActionId,
        error: &str,
    ) -> Result<TransitionOutcome, AppError> {
        self.apply(id, StatusChange::to(ActionStatus::Failed).with_error(error))
            .await
    }

    /// Counts a failed attempt on a `syncing` action. Escalates to `failed`
    /// once `max_retries` attempts were made, otherwise returns it to
    /// `pending`. Returns the resulting status.
    pub async fn record_transient_failure(
        &self,
        id: &ActionId,
        error: &str,
        max_retries: u32,
    ) -> Result<ActionStatus, AppError> {
        let current = self.require(id).await?;
        let attempts = current.retry_count.saturating_add(1);
        let change = if attempts >= max_retries {
            StatusChange::to(ActionStatus::Failed)
                .counting_attempt()
                .with_error(error)
        } else {
            StatusChange::to(ActionStatus::Pending).counting_attempt()
        };
        let next = change.to;

        if current.status != ActionStatus::Syncing {
            return Err(AppError::invalid_transition(
                id,
                current.status.as_str(),
                next.as_str(),
            ));
        }

        match self
            .store
            .transition(id, &[ActionStatus::Syncing], change)
            .await?
        {
            Some(updated) => {
                tracing::debug!(
                    action_id = %id,
                    retry_count = updated.retry_count,
                    status = %updated.status,
                    "transient failure recorded"
                );
                Ok(next)
            }
            None => Err(AppError::invalid_transition(id, "syncing", next.as_str())),
        }
    }

    pub async fn cancel(&self, id: &ActionId) -> Result<bool, AppError> {
        Ok(self.cancel_with_reason(id).await? == CancelOutcome::Cancelled)
    }

    pub async fn cancel_with_reason(&self, id: &ActionId) -> Result<CancelOutcome, AppError> {
        let Some(current) = self.store.get(id).await? else {
            return Ok(CancelOutcome::NotFound);
        };

        let outcome = if current.is_cancellable() {
            let updated = self
                .store
                .transition(
                    id,
                    &[ActionStatus::Pending, ActionStatus::Failed],
                    StatusChange::to(ActionStatus::Cancelled),
                )
                .await?;
            match updated {
                Some(_) => CancelOutcome::Cancelled,
                // picked up by a drain between the read and the write
                None => CancelOutcome::TooLate,
            }
        } else if current.status.is_terminal() {
            CancelOutcome::AlreadyFinished(current.status)
        } else {
            CancelOutcome::TooLate
        };

        if outcome != CancelOutcome::Cancelled {
            tracing::info!(action_id = %id, "cancel refused: {}", outcome.message());
        }
        Ok(outcome)
    }

    /// `failed -> pending` with a fresh attempt budget.
    pub async fn retry(&self, id: &ActionId) -> Result<bool, AppError> {
        let updated = self
            .store
            .transition(
                id,
                &[ActionStatus::Failed],
                StatusChange::to(ActionStatus::Pending).resetting_attempts(),
            )
            .await?;
        Ok(updated.is_some())
    }

    /// Moves every `failed` action (optionally of one user) back to
    /// `pending`. Returns how many were requeued.
    pub async fn retry_failed(&self, user_id: Option<&UserId>) -> Result<u32, AppError> {
        let mut requeued = 0;
        for action in self.list_failed(user_id).await? {
            if self.retry(&action.id).await? {
                requeued += 1;
            }
        }
        if requeued > 0 {
            tracing::info!(requeued, user_id = ?user_id.map(UserId::as_str), "failed actions requeued");
        }
        Ok(requeued)
    }

    /// Returns actions left in `syncing` by an interrupted pass to `pending`,
    /// counting the interrupted send as an attempt. Runs before the first
    /// drain, while nothing can legitimately be in flight.
    pub async fn recover_interrupted(&self, max_retries: u32) -> Result<u32, AppError> {
        let mut recovered = 0;
        for action in self
            .store
            .list_by_status(&[ActionStatus::Syncing], None)
            .await?
        {
            let status = self
                .record_transient_failure(
                    &action.id,
                    "sync interrupted before the remote side answered",
                    max_retries,
                )
                .await?;
            tracing::warn!(action_id = %action.id, status = %status, "recovered interrupted action");
            recovered += 1;
        }
        Ok(recovered)
    }

    pub async fn stats(&self, user_id: Option<&UserId>) -> Result<QueueStats, AppError> {
        self.store.stats(user_id).await
    }

    /// Deletes `synced`/`cancelled` actions older than the retention window.
    pub async fn purge_terminal(&self) -> Result<u64, AppError> {
        let cutoff = Utc::now() - self.retention;
        let removed = self.store.delete_terminal_before(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "purged terminal actions");
        }
        Ok(removed)
    }

    async fn require(&self, id: &ActionId) -> Result<QueuedAction, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("queued action {id}")))
    }

    async fn apply(
        &self,
        id: &ActionId,
        change: StatusChange,
    ) -> Result<TransitionOutcome, AppError> {
        let to = change.to;
        let current = self.require(id).await?;

        if current.status == to {
            return Ok(TransitionOutcome::Unchanged(to));
        }
        if !current.status.can_transition_to(to) {
            return Err(AppError::invalid_transition(
                id,
                current.status.as_str(),
                to.as_str(),
            ));
        }

        match self.store.transition(id, &[current.status], change).await? {
            Some(_) => {
                tracing::debug!(action_id = %id, from = %current.status, to = %to, "status changed");
                Ok(TransitionOutcome::Applied {
                    from: current.status,
                    to,
                })
            }
            None => {
                // moved underneath us; only the idempotent case is acceptable
                let latest = self.require(id).await?;
                if latest.status == to {
                    Ok(TransitionOutcome::Unchanged(to))
                } else {
                    Err(AppError::invalid_transition(
                        id,
                        latest.status.as_str(),
                        to.as_str(),
                    ))
                }
            }
        }
    }
}
