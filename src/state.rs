use crate::application::ports::{ConnectivityProbe, ReferenceCache, RemoteGateway};
use crate::application::services::{
    ActionQueue, ConnectivityMonitor, FacadeSettings, QueueEventBus, QueueFacade, SyncEngine,
    SyncSettings,
};
use crate::infrastructure::connectivity::{ConnectivityWatcher, HttpConnectivityProbe};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::jobs::SyncScheduler;
use crate::infrastructure::offline::{SqliteActionStore, SqliteReferenceCache};
use crate::infrastructure::remote::HttpSessionGateway;
use crate::shared::config::AppConfig;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct BackgroundTasks {
    scheduler: Option<SyncScheduler>,
    watcher: Option<ConnectivityWatcher>,
}

/// Composition root. Owns every service and the lifecycle of the
/// background tasks.
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub events: QueueEventBus,
    pub queue: Arc<ActionQueue>,
    pub references: Arc<dyn ReferenceCache>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub sync_engine: Arc<SyncEngine>,
    pub facade: Arc<QueueFacade>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    tasks: Mutex<BackgroundTasks>,
}

impl AppState {
    /// Wires the HTTP gateway from `config.remote`.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let remote = HttpSessionGateway::new(&config.remote, config.sync.request_timeout())
            .context("Failed to build remote gateway")?;
        Self::with_remote(config, Arc::new(remote)).await
    }

    pub async fn with_remote(
        config: AppConfig,
        remote: Arc<dyn RemoteGateway>,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|msg| anyhow::anyhow!("Invalid configuration: {msg}"))?;

        let pool = ConnectionPool::new(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        pool.migrate().await.context("Failed to run migrations")?;

        let probe = match &config.connectivity.probe_url {
            Some(url) => {
                let timeout = Duration::from_millis(config.connectivity.slow_latency_ms.max(1_000));
                let probe = HttpConnectivityProbe::new(url.clone(), timeout)
                    .context("Failed to build connectivity probe")?;
                Some(Arc::new(probe) as Arc<dyn ConnectivityProbe>)
            }
            None => None,
        };

        let events = QueueEventBus::default();
        let queue = Arc::new(ActionQueue::new(
            Arc::new(SqliteActionStore::new(pool.clone())),
            config.sync.retention(),
        ));
        let settings = SyncSettings::from(&config.sync);
        // an earlier process may have died between claiming and settling
        let recovered = queue
            .recover_interrupted(settings.max_retries)
            .await
            .context("Failed to recover interrupted actions")?;
        if recovered > 0 {
            tracing::warn!(recovered, "requeued actions interrupted mid-sync");
        }
        let references: Arc<dyn ReferenceCache> = Arc::new(SqliteReferenceCache::new(pool.clone()));
        // without a probe the host reports connectivity through the facade
        let connectivity = Arc::new(ConnectivityMonitor::new(
            &config.connectivity,
            probe.is_none(),
            events.clone(),
        ));
        let sync_engine = Arc::new(SyncEngine::new(
            Arc::clone(&queue),
            remote,
            Arc::clone(&connectivity),
            events.clone(),
            settings,
        ));
        let facade = Arc::new(QueueFacade::new(
            Arc::clone(&queue),
            Arc::clone(&sync_engine),
            Arc::clone(&connectivity),
            Arc::clone(&references),
            events.clone(),
            FacadeSettings::from(&config),
        ));

        Ok(Self {
            config,
            pool,
            events,
            queue,
            references,
            connectivity,
            sync_engine,
            facade,
            probe,
            tasks: Mutex::new(BackgroundTasks::default()),
        })
    }

    /// Spawns the scheduler and the connectivity watcher. Calling it again
    /// while they run is a no-op.
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut tasks = self.tasks.lock().await;

        let expired = self
            .references
            .purge_expired(Utc::now())
            .await
            .context("Failed to purge expired reference entries")?;
        if expired > 0 {
            tracing::info!(expired, "purged expired reference entries");
        }

        if tasks.watcher.is_none()
            && let Some(probe) = &self.probe
        {
            tasks.watcher = Some(ConnectivityWatcher::spawn(
                Arc::clone(probe),
                Arc::clone(&self.connectivity),
                Duration::from_secs(self.config.connectivity.probe_interval_secs.max(1)),
            ));
        }

        if tasks.scheduler.is_none() && self.config.sync.auto_sync {
            tasks.scheduler = Some(SyncScheduler::spawn(
                Arc::clone(&self.sync_engine),
                Arc::clone(&self.queue),
                Arc::clone(&self.connectivity),
                self.config.sync.sync_interval(),
            ));
        }

        tracing::info!(
            auto_sync = self.config.sync.auto_sync,
            probing = self.probe.is_some(),
            "offline queue started"
        );
        Ok(())
    }

    /// Stops background tasks and closes the database pool.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        if let Some(scheduler) = tasks.scheduler.take() {
            scheduler.stop().await;
        }
        if let Some(watcher) = tasks.watcher.take() {
            watcher.stop().await;
        }
        self.pool.close().await;
        tracing::info!("offline queue stopped");
    }
}
