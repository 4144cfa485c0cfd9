pub mod action_store;
pub mod connectivity_probe;
pub mod reference_cache;
pub mod remote_gateway;

pub use action_store::{ActionStore, StatusChange};
pub use connectivity_probe::{ConnectivityProbe, ProbeResult};
pub use reference_cache::ReferenceCache;
pub use remote_gateway::{RemoteGateway, SyncError};
