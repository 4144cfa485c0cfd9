pub mod http_probe;
pub mod watcher;

pub use http_probe::HttpConnectivityProbe;
pub use watcher::ConnectivityWatcher;
