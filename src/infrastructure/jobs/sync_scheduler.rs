use crate::application::services::action_queue::ActionQueue;
use crate::application::services::connectivity::ConnectivityMonitor;
use crate::application::services::sync_engine::{DrainTrigger, SyncEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Fires drain passes on a timer and whenever connectivity comes back, and
/// purges old terminal actions now and then.
pub struct SyncScheduler {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    pub fn spawn(
        engine: Arc<SyncEngine>,
        queue: Arc<ActionQueue>,
        connectivity: Arc<ConnectivityMonitor>,
        every: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let mut online_rx = connectivity.subscribe();
        let mut was_online = *online_rx.borrow_and_update();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut purge = tokio::time::interval(PURGE_INTERVAL);
            purge.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_drain(&engine, DrainTrigger::Timer).await;
                    }
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *online_rx.borrow_and_update();
                        if online && !was_online {
                            engine.reset_backoff().await;
                            run_drain(&engine, DrainTrigger::ConnectivityRestored).await;
                        }
                        was_online = online;
                    }
                    _ = purge.tick() => {
                        if let Err(err) = queue.purge_terminal().await {
                            tracing::error!("purging terminal actions failed: {err}");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            tracing::debug!("sync scheduler stopped");
        });

        Self {
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = self.handle.await {
            tracing::warn!("sync scheduler task failed: {err}");
        }
    }
}

async fn run_drain(engine: &SyncEngine, trigger: DrainTrigger) {
    if let Err(e) = engine.drain(trigger).await {
        tracing::error!("Sync error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::remote_gateway::{RemoteGateway, SyncError};
    use crate::application::services::events::{QueueEvent, QueueEventBus};
    use crate::application::services::sync_engine::SyncSettings;
    use crate::domain::entities::{CheckInPayload, CheckOutPayload, QueuedActionDraft, RemoteReceipt};
    use crate::domain::value_objects::{ActionId, ActionPayload, ActionType, UserId};
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::SqliteActionStore;
    use crate::shared::config::{ConnectivityConfig, SyncConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RemoteGateway for CountingGateway {
        async fn create_session(&self, _: &CheckInPayload) -> Result<RemoteReceipt, SyncError> {
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
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RemoteReceipt::default())
        }
    }

    #[tokio::test]
    async fn test_connectivity_restore_triggers_drain() {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let events = QueueEventBus::default();
        let queue = Arc::new(ActionQueue::new(
            Arc::new(SqliteActionStore::new(pool)),
            chrono::Duration::hours(1),
        ));
        let connectivity = Arc::new(ConnectivityMonitor::new(
            &ConnectivityConfig::default(),
            false,
            events.clone(),
        ));
        let gateway = Arc::new(CountingGateway::default());
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&queue),
            gateway.clone(),
            Arc::clone(&connectivity),
            events.clone(),
            SyncSettings::from(&SyncConfig::default()),
        ));

        queue
            .enqueue(QueuedActionDraft::new(
                ActionType::custom("note").unwrap(),
                ActionPayload::new(serde_json::json!({"text": "hi"})).unwrap(),
                UserId::new("user-1").unwrap(),
            ))
            .await
            .unwrap();

        let mut rx = events.subscribe();
        let scheduler = SyncScheduler::spawn(
            Arc::clone(&engine),
            Arc::clone(&queue),
            Arc::clone(&connectivity),
            Duration::from_secs(3600),
        );
        connectivity.set_online(true).await;

        let finished = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(QueueEvent::DrainFinished(summary)) = rx.recv().await {
                    return summary;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(finished.synced, 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
    }
}
