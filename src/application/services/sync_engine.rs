use crate::application::ports::remote_gateway::{RemoteGateway, SyncError};
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::connectivity::ConnectivityMonitor;
use crate::application::services::events::{QueueEvent, QueueEventBus};
use crate::domain::entities::{
    CheckInPayload, CheckOutPayload, DrainSkipReason, DrainSummary, QueuedAction, RemoteReceipt,
    TransitionOutcome,
};
use crate::domain::value_objects::{ActionId, ActionPayload, ActionStatus, ActionType, UserId};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    /// Requested by the user. `force` drains even on an unstable connection.
    Manual { force: bool },
    Timer,
    ConnectivityRestored,
}

impl DrainTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            DrainTrigger::Manual { .. } => "manual",
            DrainTrigger::Timer => "timer",
            DrainTrigger::ConnectivityRestored => "connectivity_restored",
        }
    }
}

/// One remote operation, borrowed from its payload.
#[derive(Debug, Clone, Copy)]
pub enum RemoteRequest<'a> {
    CheckIn(&'a CheckInPayload),
    CheckOut(&'a CheckOutPayload),
    Custom(&'a ActionId, &'a str, &'a ActionPayload),
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            request_timeout: config.request_timeout(),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

#[derive(Debug, Default)]
struct BackoffState {
    consecutive_failures: u32,
    next_allowed: Option<Instant>,
}

/// Delay before the next timer-triggered pass after `consecutive` passes
/// with transient failures. Jitter is added separately.
pub fn backoff_delay(consecutive: u32, base: Duration, max: Duration) -> Duration {
    if consecutive == 0 {
        return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(consecutive.saturating_sub(1).min(31));
    base.saturating_mul(factor).min(max)
}

fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 5;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the queue against the remote service, one action at a time.
pub struct SyncEngine {
    queue: Arc<ActionQueue>,
    remote: Arc<dyn RemoteGateway>,
    connectivity: Arc<ConnectivityMonitor>,
    events: QueueEventBus,
    settings: SyncSettings,
    draining: AtomicBool,
    backoff: Mutex<BackoffState>,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<ActionQueue>,
        remote: Arc<dyn RemoteGateway>,
        connectivity: Arc<ConnectivityMonitor>,
        events: QueueEventBus,
        settings: SyncSettings,
    ) -> Self {
        Self {
            queue,
            remote,
            connectivity,
            events,
            settings,
            draining: AtomicBool::new(false),
            backoff: Mutex::new(BackoffState::default()),
        }
    }

    pub async fn reset_backoff(&self) {
        *self.backoff.lock().await = BackoffState::default();
    }

    /// Runs one drain pass unless the connection or another pass rules it
    /// out, in which case the summary carries the skip reason.
    pub async fn drain(&self, trigger: DrainTrigger) -> Result<DrainSummary, AppError> {
        if !self.connectivity.is_online() {
            return Ok(DrainSummary::skipped(DrainSkipReason::Offline));
        }
        let force = matches!(trigger, DrainTrigger::Manual { force: true });
        if !force && self.connectivity.is_unstable().await {
            tracing::debug!(trigger = trigger.as_str(), "drain skipped: connection unstable");
            return Ok(DrainSummary::skipped(DrainSkipReason::Unstable));
        }
        if trigger == DrainTrigger::Timer
            && let Some(next) = self.backoff.lock().await.next_allowed
            && Instant::now() < next
        {
            return Ok(DrainSummary::skipped(DrainSkipReason::BackingOff));
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(trigger = trigger.as_str(), "drain skipped: pass already running");
            return Ok(DrainSummary::skipped(DrainSkipReason::AlreadyRunning));
        }
        let _guard = DrainGuard(&self.draining);

        let started = Instant::now();
        let summary = self.run_pass().await?;
        self.update_backoff(&summary).await;

        let idle = summary.processed == 0 && summary.deferred == 0 && summary.errors == 0;
        if !(idle && trigger == DrainTrigger::Timer) {
            tracing::info!(
                trigger = trigger.as_str(),
                processed = summary.processed,
                synced = summary.synced,
                failed = summary.failed,
                requeued = summary.requeued,
                deferred = summary.deferred,
                parked = summary.parked.len(),
                errors = summary.errors,
                duration_ms = started.elapsed().as_millis() as u64,
                "drain pass finished"
            );
            self.events.publish(QueueEvent::DrainFinished(summary.clone()));
            match self.queue.stats(None).await {
                Ok(stats) => self.events.publish(QueueEvent::StatsUpdated(stats)),
                Err(err) => tracing::warn!(error = %err, "failed to read queue stats after drain"),
            }
        }

        Ok(summary)
    }

    /// Sends one request with the per-request timeout, feeding the outcome
    /// into the connectivity monitor.
    pub async fn send(&self, request: RemoteRequest<'_>) -> Result<RemoteReceipt, SyncError> {
        let started = Instant::now();
        let call = async {
            match request {
                RemoteRequest::CheckIn(payload) => self.remote.create_session(payload).await,
                RemoteRequest::CheckOut(payload) => self.remote.update_session(payload).await,
                RemoteRequest::Custom(id, kind, payload) => {
                    self.remote.dispatch_custom(id, kind, payload).await
                }
            }
        };

        let result = match tokio::time::timeout(self.settings.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::transient(format!(
                "request timed out after {}ms",
                self.settings.request_timeout.as_millis()
            ))),
        };

        match &result {
            Err(err) if err.is_transient() => self.connectivity.record_failure().await,
            // a rejection still proves the remote side is reachable
            _ => self.connectivity.record_success(started.elapsed()).await,
        }
        result
    }

    async fn run_pass(&self) -> Result<DrainSummary, AppError> {
        let mut summary = DrainSummary::default();
        // users whose stream must not advance past an unsent action this pass
        let mut blocked: HashSet<UserId> = HashSet::new();

        for action in self.queue.list_eligible().await? {
            if !self.connectivity.is_online() {
                tracing::info!("connectivity lost mid-pass, stopping drain");
                break;
            }
            if blocked.contains(&action.user_id) {
                summary.deferred += 1;
                continue;
            }

            if let Err(err) = self.process(&action, &mut summary, &mut blocked).await {
                summary.errors += 1;
                blocked.insert(action.user_id.clone());
                tracing::warn!(
                    action_id = %action.id,
                    error = %err,
                    "store error while syncing action, moving on"
                );
            }
        }

        Ok(summary)
    }

    async fn process(
        &self,
        action: &QueuedAction,
        summary: &mut DrainSummary,
        blocked: &mut HashSet<UserId>,
    ) -> Result<(), AppError> {
        match self.dependency_gate(action).await? {
            Gate::Ready => {}
            Gate::Wait => {
                summary.deferred += 1;
                blocked.insert(action.user_id.clone());
                return Ok(());
            }
            Gate::Parked => {
                summary.deferred += 1;
                summary.parked.push(action.id.clone());
                tracing::debug!(action_id = %action.id, "parked behind a failed dependency");
                return Ok(());
            }
            Gate::Doomed(reason) => {
                if self.claim(action).await? {
                    self.queue.mark_failed(&action.id, &reason).await?;
                    summary.processed += 1;
                    summary.failed += 1;
                    tracing::warn!(action_id = %action.id, "{reason}");
                }
                return Ok(());
            }
        }

        if !self.claim(action).await? {
            return Ok(());
        }
        summary.processed += 1;

        match self.dispatch(action).await {
            Ok(receipt) => {
                self.queue.mark_synced(&action.id).await?;
                summary.synced += 1;
                tracing::debug!(
                    action_id = %action.id,
                    remote_id = ?receipt.remote_id,
                    "action synced"
                );
            }
            Err(SyncError::Transient { reason }) => {
                let status = self
                    .queue
                    .record_transient_failure(&action.id, &reason, self.settings.max_retries)
                    .await?;
                if status == ActionStatus::Failed {
                    summary.failed += 1;
                } else {
                    summary.requeued += 1;
                    blocked.insert(action.user_id.clone());
                }
                tracing::warn!(
                    action_id = %action.id,
                    status = %status,
                    "transient sync failure: {reason}"
                );
            }
            Err(SyncError::Permanent { reason }) => {
                self.queue.mark_failed(&action.id, &reason).await?;
                summary.failed += 1;
                tracing::warn!(action_id = %action.id, "remote rejected action: {reason}");
            }
        }
        Ok(())
    }

    /// `pending -> syncing`. False when the action moved since it was listed.
    async fn claim(&self, action: &QueuedAction) -> Result<bool, AppError> {
        match self.queue.mark_syncing(&action.id).await {
            Ok(TransitionOutcome::Applied { .. }) => Ok(true),
            Ok(TransitionOutcome::Unchanged(_)) => Ok(false),
            Err(AppError::InvalidTransition(msg)) | Err(AppError::NotFound(msg)) => {
                tracing::debug!(action_id = %action.id, "skipping action: {msg}");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn dependency_gate(&self, action: &QueuedAction) -> Result<Gate, AppError> {
        let Some(dependency) = &action.depends_on else {
            return Ok(Gate::Ready);
        };
        let gate = match self.queue.get(dependency).await? {
            // purged after syncing
            None => Gate::Ready,
            Some(dep) => match dep.status {
                ActionStatus::Synced => Gate::Ready,
                ActionStatus::Cancelled => {
                    Gate::Doomed(format!("dependency {dependency} was cancelled"))
                }
                ActionStatus::Failed => Gate::Parked,
                ActionStatus::Pending | ActionStatus::Syncing => Gate::Wait,
            },
        };
        Ok(gate)
    }

    async fn dispatch(&self, action: &QueuedAction) -> Result<RemoteReceipt, SyncError> {
        match &action.action_type {
            ActionType::CheckIn => {
                let payload: CheckInPayload =
                    action.payload.decode().map_err(SyncError::permanent)?;
                self.send(RemoteRequest::CheckIn(&payload)).await
            }
            ActionType::CheckOut => {
                let payload: CheckOutPayload =
                    action.payload.decode().map_err(SyncError::permanent)?;
                self.send(RemoteRequest::CheckOut(&payload)).await
            }
            ActionType::Custom(kind) => {
                self.send(RemoteRequest::Custom(&action.id, kind, &action.payload))
                    .await
            }
        }
    }

    async fn update_backoff(&self, summary: &DrainSummary) {
        let mut backoff = self.backoff.lock().await;
        if summary.had_transient_failures() {
            backoff.consecutive_failures = backoff.consecutive_failures.saturating_add(1);
            let delay = with_jitter(backoff_delay(
                backoff.consecutive_failures,
                self.settings.backoff_base,
                self.settings.backoff_max,
            ));
            backoff.next_allowed = Some(Instant::now() + delay);
            tracing::debug!(
                consecutive = backoff.consecutive_failures,
                delay_ms = delay.as_millis() as u64,
                "backing off timer-triggered drains"
            );
        } else {
            *backoff = BackoffState::default();
        }
    }
}

enum Gate {
    Ready,
    /// The dependency is still on its way. Holds the user's whole stream.
    Wait,
    /// The dependency failed. Only this action waits for its retry.
    Parked,
    /// The action can never succeed and goes straight to `failed`.
    Doomed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::action_store::{ActionStore, StatusChange};
    use crate::domain::entities::{QueueStats, QueuedActionDraft};
    use crate::domain::value_objects::{GeoPoint, SchoolId, SessionId};
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::SqliteActionStore;
    use crate::shared::config::ConnectivityConfig;
    use async_trait::async_trait;
    use chrono::Utc;
    use mockall::mock;

    mock! {
        pub Remote {}

        #[async_trait]
        impl RemoteGateway for Remote {
            async fn create_session(&self, payload: &CheckInPayload) -> Result<RemoteReceipt, SyncError>;
            async fn update_session(&self, payload: &CheckOutPayload) -> Result<RemoteReceipt, SyncError>;
            async fn dispatch_custom(&self, action_id: &ActionId, action_type: &str, payload: &ActionPayload) -> Result<RemoteReceipt, SyncError>;
        }
    }

    struct Harness {
        queue: Arc<ActionQueue>,
        connectivity: Arc<ConnectivityMonitor>,
        engine: SyncEngine,
    }

    async fn harness(remote: MockRemote, online: bool) -> Harness {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        harness_over(Arc::new(SqliteActionStore::new(pool)), remote, online)
    }

    fn harness_over(store: Arc<dyn ActionStore>, remote: MockRemote, online: bool) -> Harness {
        let queue = Arc::new(ActionQueue::new(store, chrono::Duration::hours(1)));
        let events = QueueEventBus::default();
        let connectivity = Arc::new(ConnectivityMonitor::new(
            &ConnectivityConfig::default(),
            online,
            events.clone(),
        ));
        let engine = SyncEngine::new(
            Arc::clone(&queue),
            Arc::new(remote),
            Arc::clone(&connectivity),
            events,
            SyncSettings::from(&SyncConfig::default()),
        );
        Harness {
            queue,
            connectivity,
            engine,
        }
    }

    fn check_in(user: &str) -> QueuedActionDraft {
        let payload = CheckInPayload {
            session_id: SessionId::generate(),
            school_id: SchoolId::new("school-1").unwrap(),
            user_id: UserId::new(user).unwrap(),
            location: GeoPoint::new(1.0, 1.0).unwrap(),
            client_timestamp: Utc::now(),
        };
        QueuedActionDraft::new(
            ActionType::CheckIn,
            ActionPayload::from_serializable(&payload).unwrap(),
            UserId::new(user).unwrap(),
        )
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(30);
        assert_eq!(backoff_delay(0, base, max), Duration::ZERO);
        assert_eq!(backoff_delay(1, base, max), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, base, max), Duration::from_secs(4));
        assert_eq!(backoff_delay(4, base, max), Duration::from_secs(16));
        assert_eq!(backoff_delay(5, base, max), max);
        assert_eq!(backoff_delay(u32::MAX, base, max), max);
    }

    #[test]
    fn test_jitter_stays_within_a_fifth() {
        let delay = Duration::from_secs(10);
        for _ in 0..50 {
            let jittered = with_jitter(delay);
            assert!(jittered >= delay && jittered <= Duration::from_secs(12));
        }
    }

    #[tokio::test]
    async fn test_offline_drain_is_a_noop() {
        let mut remote = MockRemote::new();
        remote.expect_create_session().never();
        let h = harness(remote, false).await;
        h.queue.enqueue(check_in("user-1")).await.unwrap();

        let summary = h.engine.drain(DrainTrigger::Manual { force: true }).await.unwrap();
        assert_eq!(summary.skipped, Some(DrainSkipReason::Offline));
        assert_eq!(h.queue.stats(None).await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_permanent_rejection_fails_without_retry() {
        let mut remote = MockRemote::new();
        remote
            .expect_create_session()
            .times(1)
            .returning(|_| Err(SyncError::permanent("school closed")));
        let h = harness(remote, true).await;
        let id = h.queue.enqueue(check_in("user-1")).await.unwrap();

        let summary = h.engine.drain(DrainTrigger::Manual { force: false }).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);

        let action = h.queue.get(&id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(action.retry_count, 0);
        assert_eq!(action.last_error.as_deref(), Some("school closed"));

        let again = h.engine.drain(DrainTrigger::Manual { force: false }).await.unwrap();
        assert_eq!(again.processed, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_requeues_and_blocks_user_stream() {
        let mut remote = MockRemote::new();
        remote
            .expect_create_session()
            .times(2)
            .returning(|payload| {
                if payload.user_id.as_str() == "user-1" {
                    Err(SyncError::transient("connection reset"))
                } else {
                    Ok(RemoteReceipt::default())
                }
            });
        let h = harness(remote, true).await;
        let first = h.queue.enqueue(check_in("user-1")).await.unwrap();
        h.queue.enqueue(check_in("user-1")).await.unwrap();
        h.queue.enqueue(check_in("user-2")).await.unwrap();

        let summary = h.engine.drain(DrainTrigger::Manual { force: true }).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.requeued, 1);
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.synced, 1);

        let action = h.queue.get(&first).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(action.retry_count, 1);
    }

    #[tokio::test]
    async fn test_timer_respects_backoff_but_manual_does_not() {
        let mut remote = MockRemote::new();
        remote
            .expect_create_session()
            .times(2)
            .returning(|_| Err(SyncError::transient("503")));
        let h = harness(remote, true).await;
        h.queue.enqueue(check_in("user-1")).await.unwrap();

        h.engine.drain(DrainTrigger::Timer).await.unwrap();
        h.connectivity.set_online(false).await;
        h.connectivity.set_online(true).await;

        let timer = h.engine.drain(DrainTrigger::Timer).await.unwrap();
        assert_eq!(timer.skipped, Some(DrainSkipReason::BackingOff));

        let manual = h.engine.drain(DrainTrigger::Manual { force: true }).await.unwrap();
        assert_eq!(manual.processed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_dependency_fails_dependent() {
        let mut remote = MockRemote::new();
        remote.expect_update_session().never();
        let h = harness(remote, true).await;
        let check_in_id = h.queue.enqueue(check_in("user-1")).await.unwrap();
        let payload = CheckOutPayload {
            session_id: SessionId::generate(),
            user_id: UserId::new("user-1").unwrap(),
            location: GeoPoint::new(1.0, 1.0).unwrap(),
            client_timestamp: Utc::now(),
        };
        let check_out = QueuedActionDraft::new(
            ActionType::CheckOut,
            ActionPayload::from_serializable(&payload).unwrap(),
            UserId::new("user-1").unwrap(),
        )
        .depends_on(Some(check_in_id.clone()));
        let check_out_id = h.queue.enqueue(check_out).await.unwrap();
        assert!(h.queue.cancel(&check_in_id).await.unwrap());

        let summary = h.engine.drain(DrainTrigger::Manual { force: false }).await.unwrap();
        assert_eq!(summary.failed, 1);
        let action = h.queue.get(&check_out_id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
    }

    struct StalledGateway;

    #[async_trait]
    impl RemoteGateway for StalledGateway {
        async fn create_session(&self, _: &CheckInPayload) -> Result<RemoteReceipt, SyncError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RemoteReceipt::default())
        }

        async fn update_session(&self, _: &CheckOutPayload) -> Result<RemoteReceipt, SyncError> {
            Ok(RemoteReceipt::default())
        }

        async fn dispatch_custom(
            &self,
            _: &ActionId,
            _: &str,
            _: &ActionPayload,
        ) -> Result<RemoteReceipt, SyncError> {
            Ok(RemoteReceipt::default())
        }
    }

    #[tokio::test]
    async fn test_request_timeout_counts_as_transient_failure() {
        let h = harness(MockRemote::new(), true).await;
        let config = SyncConfig {
            request_timeout_ms: 50,
            ..SyncConfig::default()
        };
        let engine = SyncEngine::new(
            Arc::clone(&h.queue),
            Arc::new(StalledGateway),
            Arc::clone(&h.connectivity),
            QueueEventBus::default(),
            SyncSettings::from(&config),
        );
        let id = h.queue.enqueue(check_in("user-1")).await.unwrap();

        let summary = engine.drain(DrainTrigger::Manual { force: true }).await.unwrap();
        assert_eq!(summary.requeued, 1);
        let action = h.queue.get(&id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(action.retry_count, 1);
        assert!(h.connectivity.is_unstable().await);
    }

    async fn status_of(queue: &ActionQueue, id: &ActionId) -> ActionStatus {
        queue.get(id).await.unwrap().unwrap().status
    }

    /// Refuses to record `synced` for one chosen action.
    struct SyncedWriteFails {
        inner: SqliteActionStore,
        target: std::sync::Mutex<Option<ActionId>>,
    }

    #[async_trait]
    impl ActionStore for SyncedWriteFails {
        async fn insert(&self, action: &QueuedAction) -> Result<(), AppError> {
            self.inner.insert(action).await
        }

        async fn get(&self, id: &ActionId) -> Result<Option<QueuedAction>, AppError> {
            self.inner.get(id).await
        }

        async fn transition(
            &self,
            id: &ActionId,
            expected: &[ActionStatus],
            change: StatusChange,
        ) -> Result<Option<QueuedAction>, AppError> {
            let hit = self.target.lock().unwrap().as_ref() == Some(id);
            if hit && change.to == ActionStatus::Synced {
                return Err(AppError::Storage("database is locked".to_string()));
            }
            self.inner.transition(id, expected, change).await
        }

        async fn list_by_status(
            &self,
            statuses: &[ActionStatus],
            user_id: Option<&UserId>,
        ) -> Result<Vec<QueuedAction>, AppError> {
            self.inner.list_by_status(statuses, user_id).await
        }

        async fn stats(&self, user_id: Option<&UserId>) -> Result<QueueStats, AppError> {
            self.inner.stats(user_id).await
        }

        async fn delete_terminal_before(
            &self,
            cutoff: chrono::DateTime<Utc>,
        ) -> Result<u64, AppError> {
            self.inner.delete_terminal_before(cutoff).await
        }
    }

    #[tokio::test]
    async fn test_store_error_on_one_action_does_not_abort_pass() {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let store = Arc::new(SyncedWriteFails {
            inner: SqliteActionStore::new(pool),
            target: std::sync::Mutex::new(None),
        });
        let mut remote = MockRemote::new();
        remote
            .expect_create_session()
            .times(2)
            .returning(|_| Ok(RemoteReceipt::default()));
        let h = harness_over(store.clone(), remote, true);

        let broken = h.queue.enqueue(check_in("user-1")).await.unwrap();
        let held = h.queue.enqueue(check_in("user-1")).await.unwrap();
        let other = h.queue.enqueue(check_in("user-2")).await.unwrap();
        *store.target.lock().unwrap() = Some(broken.clone());

        let summary = h.engine.drain(DrainTrigger::Manual { force: true }).await.unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.deferred, 1);

        assert_eq!(status_of(&h.queue, &broken).await, ActionStatus::Syncing);
        assert_eq!(status_of(&h.queue, &held).await, ActionStatus::Pending);
        assert_eq!(status_of(&h.queue, &other).await, ActionStatus::Synced);

        assert_eq!(h.queue.recover_interrupted(3).await.unwrap(), 1);
        assert_eq!(status_of(&h.queue, &broken).await, ActionStatus::Pending);
    }

    #[tokio::test]
    async fn test_check_out_behind_failed_check_in_is_parked() {
        let mut remote = MockRemote::new();
        remote
            .expect_create_session()
            .times(1)
            .returning(|_| Ok(RemoteReceipt::default()));
        remote.expect_update_session().never();
        let h = harness(remote, true).await;

        let failed = h.queue.enqueue(check_in("user-1")).await.unwrap();
        h.queue.mark_syncing(&failed).await.unwrap();
        h.queue.mark_failed(&failed, "school closed").await.unwrap();
        let payload = CheckOutPayload {
            session_id: SessionId::generate(),
            user_id: UserId::new("user-1").unwrap(),
            location: GeoPoint::new(1.0, 1.0).unwrap(),
            client_timestamp: Utc::now(),
        };
        let check_out = QueuedActionDraft::new(
            ActionType::CheckOut,
            ActionPayload::from_serializable(&payload).unwrap(),
            UserId::new("user-1").unwrap(),
        )
        .depends_on(Some(failed));
        let check_out_id = h.queue.enqueue(check_out).await.unwrap();
        h.queue.enqueue(check_in("user-1")).await.unwrap();

        let summary = h.engine.drain(DrainTrigger::Manual { force: false }).await.unwrap();
        assert_eq!(summary.parked, vec![check_out_id.clone()]);
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.synced, 1);
        let action = h.queue.get(&check_out_id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Pending);
    }
}
