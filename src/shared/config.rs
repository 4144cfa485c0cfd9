use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub connectivity: ConnectivityConfig,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub max_retries: u32,
    pub request_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub retention_hours: u64,
    /// Enqueue every check-in/check-out even while online.
    #[serde(default)]
    pub speculative_enqueue: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default)]
    pub probe_url: Option<String>,
    pub probe_interval_secs: u64,
    pub sample_window: usize,
    pub sample_ttl_secs: u64,
    pub failure_ratio_threshold: f64,
    pub slow_latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub reference_ttl_secs: u64,
    pub max_checkin_radius_m: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
            },
            sync: SyncConfig::default(),
            connectivity: ConnectivityConfig::default(),
            remote: RemoteConfig {
                base_url: "http://localhost:8080/api".to_string(),
                api_token: None,
            },
            cache: CacheConfig {
                reference_ttl_secs: 24 * 3600, // 1 day
                max_checkin_radius_m: 150.0,
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_secs: 30,
            max_retries: 3,
            request_timeout_ms: 10_000,
            backoff_base_ms: 2_000,
            backoff_max_ms: 5 * 60 * 1000, // 5 minutes
            retention_hours: 24 * 7,
            speculative_enqueue: false,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_interval_secs: 15,
            sample_window: 10,
            sample_ttl_secs: 120,
            failure_ratio_threshold: 0.3,
            slow_latency_ms: 3_000,
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }
}

impl ConnectivityConfig {
    pub fn sample_ttl(&self) -> Duration {
        Duration::from_secs(self.sample_ttl_secs)
    }

    pub fn slow_latency(&self) -> Duration {
        Duration::from_millis(self.slow_latency_ms)
    }
}

fn default_database_url() -> String {
    let base = dirs::data_local_dir()
        .map(|dir| dir.join("schools-in"))
        .unwrap_or_else(|| "./data".into());
    format!("sqlite://{}/offline.db?mode=rwc", base.display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overlaid with `SCHOOLS_IN_*` values
    /// returned by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("SCHOOLS_IN_DATABASE_URL") {
            cfg.database.url = v;
        }
        if let Some(v) = lookup("SCHOOLS_IN_REMOTE_URL") {
            cfg.remote.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("SCHOOLS_IN_API_TOKEN") {
            cfg.remote.api_token = Some(v).filter(|token| !token.is_empty());
        }
        if let Some(v) = lookup("SCHOOLS_IN_PROBE_URL") {
            cfg.connectivity.probe_url = Some(v).filter(|url| !url.is_empty());
        }

        if let Some(v) = lookup("SCHOOLS_IN_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(v) = lookup("SCHOOLS_IN_SPECULATIVE_ENQUEUE") {
            cfg.sync.speculative_enqueue = parse_bool(&v, cfg.sync.speculative_enqueue);
        }
        if let Some(value) = lookup("SCHOOLS_IN_SYNC_INTERVAL_SECS").and_then(|v| parse_u64(&v)) {
            cfg.sync.sync_interval_secs = value.max(1);
        }
        if let Some(value) = lookup("SCHOOLS_IN_MAX_RETRIES").and_then(|v| parse_u64(&v)) {
            cfg.sync.max_retries = value.clamp(1, u64::from(u32::MAX)) as u32;
        }
        if let Some(value) = lookup("SCHOOLS_IN_REQUEST_TIMEOUT_MS").and_then(|v| parse_u64(&v)) {
            cfg.sync.request_timeout_ms = value.max(1);
        }
        if let Some(value) = lookup("SCHOOLS_IN_RETENTION_HOURS").and_then(|v| parse_u64(&v)) {
            cfg.sync.retention_hours = value;
        }
        if let Some(value) =
            lookup("SCHOOLS_IN_FAILURE_RATIO_THRESHOLD").and_then(|v| parse_f64(&v))
        {
            cfg.connectivity.failure_ratio_threshold = value.clamp(0.0, 1.0);
        }
        if let Some(value) = lookup("SCHOOLS_IN_SLOW_LATENCY_MS").and_then(|v| parse_u64(&v)) {
            cfg.connectivity.slow_latency_ms = value;
        }
        if let Some(value) = lookup("SCHOOLS_IN_CHECKIN_RADIUS_M").and_then(|v| parse_f64(&v)) {
            cfg.cache.max_checkin_radius_m = value.max(0.0);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.sync.request_timeout_ms == 0 {
            return Err("Sync request_timeout_ms must be greater than 0".to_string());
        }
        if self.sync.backoff_base_ms > self.sync.backoff_max_ms {
            return Err("Sync backoff_base_ms must not exceed backoff_max_ms".to_string());
        }
        if self.connectivity.sample_window == 0 {
            return Err("Connectivity sample_window must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.connectivity.failure_ratio_threshold) {
            return Err("Connectivity failure_ratio_threshold must be within 0..=1".to_string());
        }
        if self.remote.base_url.trim().is_empty() {
            return Err("Remote base_url cannot be empty".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sync.max_retries, 3);
        assert!(!cfg.sync.speculative_enqueue);
    }

    #[test]
    fn test_from_lookup_overrides_values() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("SCHOOLS_IN_DATABASE_URL", "sqlite::memory:"),
            ("SCHOOLS_IN_REMOTE_URL", "https://api.example.test/"),
            ("SCHOOLS_IN_MAX_RETRIES", "5"),
            ("SCHOOLS_IN_AUTO_SYNC", "off"),
            ("SCHOOLS_IN_FAILURE_RATIO_THRESHOLD", "1.7"),
        ]));

        assert_eq!(cfg.database.url, "sqlite::memory:");
        assert_eq!(cfg.remote.base_url, "https://api.example.test");
        assert_eq!(cfg.sync.max_retries, 5);
        assert!(!cfg.sync.auto_sync);
        assert_eq!(cfg.connectivity.failure_ratio_threshold, 1.0);
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("SCHOOLS_IN_MAX_RETRIES", "many"),
            ("SCHOOLS_IN_AUTO_SYNC", "sometimes"),
        ]));
        assert_eq!(cfg.sync.max_retries, 3);
        assert!(cfg.sync.auto_sync);
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut cfg = AppConfig::default();
        cfg.sync.backoff_base_ms = 10_000;
        cfg.sync.backoff_max_ms = 1_000;
        assert!(cfg.validate().is_err());
    }
}
