use crate::application::ports::remote_gateway::{RemoteGateway, SyncError};
use crate::domain::entities::{CheckInPayload, CheckOutPayload, RemoteReceipt};
use crate::domain::value_objects::{ActionId, ActionPayload};
use crate::shared::config::RemoteConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Decides whether a non-success HTTP answer is worth retrying.
pub fn classify_status(status: StatusCode, body: &str) -> SyncError {
    let detail = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    };

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        SyncError::transient(detail)
    } else {
        SyncError::permanent(detail)
    }
}

/// Idempotency key for a custom action. Stable across resends of one action.
pub fn custom_action_key(action_id: &ActionId) -> String {
    format!("action:{action_id}")
}

fn classify_transport(err: &reqwest::Error) -> SyncError {
    if err.is_builder() {
        SyncError::permanent(format!("invalid request: {err}"))
    } else if err.is_timeout() {
        SyncError::transient(format!("request timed out: {err}"))
    } else {
        SyncError::transient(err.to_string())
    }
}

/// Session endpoints of the Schools-In API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpSessionGateway {
    pub fn new(config: &RemoteConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<RemoteReceipt, SyncError> {
        let url = self.url(path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;

        if !status.is_success() {
            let err = classify_status(status, &body);
            tracing::debug!(url = %url, status = status.as_u16(), "remote call failed: {err}");
            return Err(err);
        }

        if body.trim().is_empty() {
            return Ok(RemoteReceipt::default());
        }
        // the receipt is informational; an unexpected body is not a failure
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

#[async_trait]
impl RemoteGateway for HttpSessionGateway {
    async fn create_session(&self, payload: &CheckInPayload) -> Result<RemoteReceipt, SyncError> {
        self.post("sessions", payload, Some(payload.session_id.as_str()))
            .await
    }

    async fn update_session(
        &self,
        payload: &CheckOutPayload,
    ) -> Result<RemoteReceipt, SyncError> {
        let key = format!("check-out:{}", payload.session_id);
        self.post(
            &format!("sessions/{}/check-out", payload.session_id),
            payload,
            Some(&key),
        )
        .await
    }

    async fn dispatch_custom(
        &self,
        action_id: &ActionId,
        action_type: &str,
        payload: &ActionPayload,
    ) -> Result<RemoteReceipt, SyncError> {
        let key = custom_action_key(action_id);
        self.post(
            &format!("actions/{action_type}"),
            payload.as_json(),
            Some(&key),
        )
        .await
    }
}
