#![allow(dead_code)]

use async_trait::async_trait;
use schools_in_lib::{
    ActionId, ActionPayload, AppConfig, AppState, CheckInPayload, CheckOutPayload, RemoteGateway,
    RemoteReceipt, SyncError,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: String,
    pub key: String,
    pub body: Value,
}

/// Remote fake that records every call, tracks how many requests for the
/// same key overlap and answers from a script.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: Mutex<HashMap<String, u32>>,
    max_in_flight: Mutex<HashMap<String, u32>>,
    script: Mutex<VecDeque<SyncError>>,
    always_fail: Mutex<Option<SyncError>>,
    delay: Duration,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    /// The next call fails with `err`; later calls succeed again.
    pub async fn fail_next(&self, err: SyncError) {
        self.script.lock().await.push_back(err);
    }

    pub async fn fail_always(&self, err: SyncError) {
        *self.always_fail.lock().await = Some(err);
    }

    pub async fn recover(&self) {
        *self.always_fail.lock().await = None;
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn max_concurrency(&self) -> u32 {
        self.max_in_flight
            .lock()
            .await
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    async fn record<T: Serialize>(
        &self,
        kind: &str,
        key: String,
        body: &T,
    ) -> Result<RemoteReceipt, SyncError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            let current = in_flight.entry(key.clone()).or_default();
            *current += 1;
            let mut max = self.max_in_flight.lock().await;
            let peak = max.entry(key.clone()).or_default();
            *peak = (*peak).max(*current);
        }
        self.calls.lock().await.push(RecordedCall {
            kind: kind.to_string(),
            key: key.clone(),
            body: serde_json::to_value(body).unwrap_or(Value::Null),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(count) = self.in_flight.lock().await.get_mut(&key) {
            *count -= 1;
        }

        if let Some(err) = self.script.lock().await.pop_front() {
            return Err(err);
        }
        if let Some(err) = self.always_fail.lock().await.clone() {
            return Err(err);
        }
        Ok(RemoteReceipt {
            remote_id: Some(format!("remote-{key}")),
        })
    }
}

#[async_trait]
impl RemoteGateway for RecordingGateway {
    async fn create_session(&self, payload: &CheckInPayload) -> Result<RemoteReceipt, SyncError> {
        self.record("check_in", format!("check_in:{}", payload.session_id), payload)
            .await
    }

    async fn update_session(&self, payload: &CheckOutPayload) -> Result<RemoteReceipt, SyncError> {
        self.record("check_out", format!("check_out:{}", payload.session_id), payload)
            .await
    }

    async fn dispatch_custom(
        &self,
        _action_id: &ActionId,
        action_type: &str,
        payload: &ActionPayload,
    ) -> Result<RemoteReceipt, SyncError> {
        let key = format!(
            "{action_type}:{}",
            payload.get_str("key").unwrap_or("unkeyed")
        );
        self.record(action_type, key, payload.as_json()).await
    }
}

pub fn test_config(database_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url.to_string();
    config.sync.auto_sync = false;
    config.sync.request_timeout_ms = 2_000;
    config.connectivity.probe_url = None;
    config
}

pub async fn setup_state(gateway: Arc<RecordingGateway>) -> AppState {
    setup_state_with(test_config("sqlite::memory:"), gateway).await
}

pub async fn setup_state_with(config: AppConfig, gateway: Arc<RecordingGateway>) -> AppState {
    AppState::with_remote(config, gateway)
        .await
        .expect("app state")
}
