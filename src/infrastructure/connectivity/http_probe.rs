use crate::application::ports::connectivity_probe::{ConnectivityProbe, ProbeResult};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Treats any HTTP answer from `url` as reachable. Only transport failures
/// count as offline.
pub struct HttpConnectivityProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpConnectivityProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn probe(&self) -> ProbeResult {
        let started = Instant::now();
        let reachable = match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(url = %self.url, "connectivity probe failed: {err}");
                false
            }
        };
        ProbeResult {
            reachable,
            latency: started.elapsed(),
        }
    }
}
