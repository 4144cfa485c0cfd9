pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::ports::{
    ActionStore, ConnectivityProbe, ProbeResult, ReferenceCache, RemoteGateway, StatusChange,
    SyncError,
};
pub use application::services::{
    ActionQueue, CheckResult, ConnectionQuality, ConnectivityMonitor, DrainTrigger,
    FacadeSettings, QueueEvent, QueueEventBus, QueueFacade, QueueReason, SyncEngine,
    SyncSettings,
};
pub use domain::entities::{
    CachedSchool, CancelOutcome, CheckInPayload, CheckOutPayload, DrainSkipReason, DrainSummary,
    QueueStats, QueuedAction, QueuedActionDraft, ReferenceEntry, RemoteReceipt,
    TransitionOutcome,
};
pub use domain::value_objects::{
    ActionId, ActionPayload, ActionStatus, ActionType, GeoPoint, SchoolId, SessionId, UserId,
};
pub use infrastructure::database::ConnectionPool;
pub use infrastructure::offline::{SqliteActionStore, SqliteReferenceCache};
pub use infrastructure::remote::HttpSessionGateway;
pub use shared::{AppConfig, AppError, Result};
pub use state::AppState;

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schools_in=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
