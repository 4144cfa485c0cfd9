use crate::application::ports::reference_cache::ReferenceCache;
use crate::application::ports::remote_gateway::SyncError;
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::connectivity::{ConnectionQuality, ConnectivityMonitor};
use crate::application::services::events::{QueueEvent, QueueEventBus};
use crate::application::services::proximity;
use crate::application::services::sync_engine::{DrainTrigger, RemoteRequest, SyncEngine};
use crate::domain::entities::{
    CancelOutcome, CheckInPayload, CheckOutPayload, DrainSummary, QueueStats, QueuedAction,
    QueuedActionDraft,
};
use crate::domain::value_objects::{
    ActionId, ActionPayload, ActionStatus, ActionType, GeoPoint, SchoolId, SessionId, UserId,
};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    Offline,
    Unstable,
    /// The user still has earlier actions waiting to be sent.
    BehindQueuedActions,
    /// The session's check-in has not reached the server yet.
    DependsOnQueuedCheckIn,
    /// The session's check-in failed. The check-out waits for its retry.
    DependsOnFailedCheckIn,
    /// The immediate attempt failed with a transient error.
    RemoteUnavailable,
    Speculative,
}

impl QueueReason {
    pub fn message(&self) -> &'static str {
        match self {
            QueueReason::Offline => "You are offline. This will sync when you reconnect.",
            QueueReason::Unstable => "Connection is unstable. Saved for sync shortly.",
            QueueReason::BehindQueuedActions => "Saved. Earlier actions are still syncing.",
            QueueReason::DependsOnQueuedCheckIn => "Saved. Waiting for your check-in to sync.",
            QueueReason::DependsOnFailedCheckIn => {
                "Saved. Your check-in failed to sync. Retry it to send this check-out."
            }
            QueueReason::RemoteUnavailable => "Server unavailable. Saved for a later retry.",
            QueueReason::Speculative => "Saved. Syncing in the background.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckResult {
    Applied {
        session_id: SessionId,
        remote_id: Option<String>,
    },
    Queued {
        action_id: ActionId,
        session_id: SessionId,
        reason: QueueReason,
    },
    /// The server refused the request. Nothing was queued.
    Rejected { reason: String },
}

impl CheckResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, CheckResult::Applied { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, CheckResult::Queued { .. })
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            CheckResult::Applied { session_id, .. } | CheckResult::Queued { session_id, .. } => {
                Some(session_id)
            }
            CheckResult::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FacadeSettings {
    pub speculative_enqueue: bool,
    pub max_checkin_radius_m: f64,
}

impl From<&AppConfig> for FacadeSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            speculative_enqueue: config.sync.speculative_enqueue,
            max_checkin_radius_m: config.cache.max_checkin_radius_m,
        }
    }
}

/// Entry point for UI code: send-or-queue check-ins and check-outs, queue
/// statistics, manual sync and change notifications.
pub struct QueueFacade {
    queue: Arc<ActionQueue>,
    engine: Arc<SyncEngine>,
    connectivity: Arc<ConnectivityMonitor>,
    references: Arc<dyn ReferenceCache>,
    events: QueueEventBus,
    settings: FacadeSettings,
}

impl QueueFacade {
    pub fn new(
        queue: Arc<ActionQueue>,
        engine: Arc<SyncEngine>,
        connectivity: Arc<ConnectivityMonitor>,
        references: Arc<dyn ReferenceCache>,
        events: QueueEventBus,
        settings: FacadeSettings,
    ) -> Self {
        Self {
            queue,
            engine,
            connectivity,
            references,
            events,
            settings,
        }
    }

    pub async fn check_in(
        &self,
        school_id: SchoolId,
        user_id: UserId,
        location: GeoPoint,
    ) -> Result<CheckResult, AppError> {
        proximity::ensure_near_school(
            self.references.as_ref(),
            &school_id,
            &location,
            self.settings.max_checkin_radius_m,
        )
        .await?;

        let payload = CheckInPayload {
            session_id: SessionId::generate(),
            school_id,
            user_id: user_id.clone(),
            location,
            client_timestamp: Utc::now(),
        };

        if let Some(reason) = self.queue_reason(&user_id).await? {
            let session_id = payload.session_id.clone();
            return self
                .enqueue(ActionType::CheckIn, &payload, user_id, session_id, None, reason)
                .await;
        }

        match self.engine.send(RemoteRequest::CheckIn(&payload)).await {
            Ok(receipt) => {
                tracing::info!(session_id = %payload.session_id, user_id = %user_id, "check-in applied");
                Ok(CheckResult::Applied {
                    session_id: payload.session_id,
                    remote_id: receipt.remote_id,
                })
            }
            Err(SyncError::Permanent { reason }) => Ok(CheckResult::Rejected { reason }),
            Err(SyncError::Transient { reason }) => {
                tracing::warn!(user_id = %user_id, "check-in send failed, queueing: {reason}");
                self.enqueue(
                    ActionType::CheckIn,
                    &payload,
                    user_id,
                    payload.session_id.clone(),
                    None,
                    QueueReason::RemoteUnavailable,
                )
                .await
            }
        }
    }

    /// Never sent ahead of the session's check-in: if that check-in is still
    /// queued, the check-out is queued behind it.
    pub async fn check_out(
        &self,
        session_id: SessionId,
        user_id: UserId,
        location: GeoPoint,
    ) -> Result<CheckResult, AppError> {
        let payload = CheckOutPayload {
            session_id: session_id.clone(),
            user_id: user_id.clone(),
            location,
            client_timestamp: Utc::now(),
        };

        if let Some(check_in) = self
            .queue
            .find_outstanding_check_in(session_id.as_str())
            .await?
        {
            let reason = if check_in.status == ActionStatus::Failed {
                QueueReason::DependsOnFailedCheckIn
            } else {
                QueueReason::DependsOnQueuedCheckIn
            };
            return self
                .enqueue(
                    ActionType::CheckOut,
                    &payload,
                    user_id,
                    session_id,
                    Some(check_in.id),
                    reason,
                )
                .await;
        }

        if let Some(reason) = self.queue_reason(&user_id).await? {
            return self
                .enqueue(ActionType::CheckOut, &payload, user_id, session_id, None, reason)
                .await;
        }

        match self.engine.send(RemoteRequest::CheckOut(&payload)).await {
            Ok(receipt) => {
                tracing::info!(session_id = %session_id, user_id = %user_id, "check-out applied");
                Ok(CheckResult::Applied {
                    session_id,
                    remote_id: receipt.remote_id,
                })
            }
            Err(SyncError::Permanent { reason }) => Ok(CheckResult::Rejected { reason }),
            Err(SyncError::Transient { reason }) => {
                tracing::warn!(user_id = %user_id, "check-out send failed, queueing: {reason}");
                self.enqueue(
                    ActionType::CheckOut,
                    &payload,
                    user_id,
                    session_id,
                    None,
                    QueueReason::RemoteUnavailable,
                )
                .await
            }
        }
    }

    /// `force` drains even when the connection looks unstable.
    pub async fn sync_now(&self, force: bool) -> Result<DrainSummary, AppError> {
        self.engine.drain(DrainTrigger::Manual { force }).await
    }

    pub async fn stats(&self) -> Result<QueueStats, AppError> {
        self.queue.stats(None).await
    }

    pub async fn list_pending(&self, user_id: Option<&UserId>) -> Result<Vec<QueuedAction>, AppError> {
        self.queue.list_pending(user_id).await
    }

    pub async fn cancel(&self, id: &ActionId) -> Result<CancelOutcome, AppError> {
        let outcome = self.queue.cancel_with_reason(id).await?;
        if outcome == CancelOutcome::Cancelled {
            self.publish_stats().await?;
        }
        Ok(outcome)
    }

    pub async fn retry(&self, id: &ActionId) -> Result<bool, AppError> {
        let retried = self.queue.retry(id).await?;
        if retried {
            self.publish_stats().await?;
        }
        Ok(retried)
    }

    pub async fn retry_failed(&self, user_id: Option<&UserId>) -> Result<u32, AppError> {
        let count = self.queue.retry_failed(user_id).await?;
        if count > 0 {
            self.publish_stats().await?;
        }
        Ok(count)
    }

    /// Platform connectivity signal.
    pub async fn set_online(&self, online: bool) -> bool {
        self.connectivity.set_online(online).await
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub async fn quality(&self) -> ConnectionQuality {
        self.connectivity.quality().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<bool> {
        self.connectivity.subscribe()
    }

    async fn queue_reason(&self, user_id: &UserId) -> Result<Option<QueueReason>, AppError> {
        if self.settings.speculative_enqueue {
            return Ok(Some(QueueReason::Speculative));
        }
        if !self.connectivity.is_online() {
            return Ok(Some(QueueReason::Offline));
        }
        if self.connectivity.is_unstable().await {
            return Ok(Some(QueueReason::Unstable));
        }
        let stats = self.queue.stats(Some(user_id)).await?;
        if stats.pending + stats.syncing > 0 {
            return Ok(Some(QueueReason::BehindQueuedActions));
        }
        Ok(None)
    }

    async fn enqueue<T: Serialize>(
        &self,
        action_type: ActionType,
        payload: &T,
        user_id: UserId,
        session_id: SessionId,
        depends_on: Option<ActionId>,
        reason: QueueReason,
    ) -> Result<CheckResult, AppError> {
        let payload = ActionPayload::from_serializable(payload).map_err(AppError::InvalidInput)?;
        let draft = QueuedActionDraft::new(action_type, payload, user_id).depends_on(depends_on);
        let action_id = self.queue.enqueue(draft).await?;
        self.publish_stats().await?;

        if reason == QueueReason::Speculative && self.connectivity.is_online() {
            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move {
                if let Err(err) = engine.drain(DrainTrigger::Manual { force: false }).await {
                    tracing::warn!("background drain failed: {err}");
                }
            });
        }

        Ok(CheckResult::Queued {
            action_id,
            session_id,
            reason,
        })
    }

    async fn publish_stats(&self) -> Result<(), AppError> {
        let stats = self.queue.stats(None).await?;
        self.events.publish(QueueEvent::StatsUpdated(stats));
        Ok(())
    }
}
