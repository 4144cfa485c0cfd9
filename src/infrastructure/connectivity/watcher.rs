use crate::application::ports::connectivity_probe::ConnectivityProbe;
use crate::application::services::connectivity::ConnectivityMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background task feeding probe results into the connectivity monitor.
pub struct ConnectivityWatcher {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ConnectivityWatcher {
    pub fn spawn(
        probe: Arc<dyn ConnectivityProbe>,
        monitor: Arc<ConnectivityMonitor>,
        every: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every.max(Duration::from_millis(10)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let result = probe.probe().await;
                        monitor.set_online(result.reachable).await;
                        if result.reachable {
                            monitor.record_success(result.latency).await;
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            tracing::debug!("connectivity watcher stopped");
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
            tracing::warn!("connectivity watcher task failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::connectivity_probe::ProbeResult;
    use crate::application::services::events::QueueEventBus;
    use crate::shared::config::ConnectivityConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ToggleProbe {
        reachable: AtomicBool,
    }

    #[async_trait]
    impl ConnectivityProbe for ToggleProbe {
        async fn probe(&self) -> ProbeResult {
            ProbeResult {
                reachable: self.reachable.load(Ordering::SeqCst),
                latency: Duration::from_millis(20),
            }
        }
    }

    #[tokio::test]
    async fn test_watcher_follows_probe() {
        let probe = Arc::new(ToggleProbe {
            reachable: AtomicBool::new(true),
        });
        let monitor = Arc::new(ConnectivityMonitor::new(
            &ConnectivityConfig::default(),
            false,
            QueueEventBus::default(),
        ));
        let mut changes = monitor.subscribe();

        let watcher = ConnectivityWatcher::spawn(
            probe.clone(),
            Arc::clone(&monitor),
            Duration::from_millis(10),
        );
        changes.changed().await.unwrap();
        assert!(*changes.borrow_and_update());

        probe.reachable.store(false, Ordering::SeqCst);
        changes.changed().await.unwrap();
        assert!(!*changes.borrow_and_update());

        watcher.stop().await;
    }
}
