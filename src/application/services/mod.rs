pub mod action_queue;
pub mod connectivity;
pub mod events;
pub mod facade;
pub mod proximity;
pub mod sync_engine;

pub use action_queue::ActionQueue;
pub use connectivity::{ConnectionQuality, ConnectivityMonitor};
pub use events::{QueueEvent, QueueEventBus};
pub use facade::{CheckResult, FacadeSettings, QueueFacade, QueueReason};
pub use proximity::ProximityCheck;
pub use sync_engine::{DrainTrigger, RemoteRequest, SyncEngine, SyncSettings};
