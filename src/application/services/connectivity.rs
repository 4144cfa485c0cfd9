use crate::application::services::events::{QueueEvent, QueueEventBus};
use crate::shared::config::ConnectivityConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Offline,
    Poor,
    Fair,
    Good,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    ok: bool,
    latency: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct SampleSummary {
    total: usize,
    failures: usize,
    slow: usize,
}

impl SampleSummary {
    fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

/// Online flag plus a rolling window of request outcomes used to judge
/// whether an immediate remote call is worth trying.
pub struct ConnectivityMonitor {
    online: watch::Sender<bool>,
    samples: Mutex<VecDeque<Sample>>,
    window: usize,
    sample_ttl: Duration,
    failure_ratio_threshold: f64,
    slow_latency: Duration,
    events: QueueEventBus,
}

impl ConnectivityMonitor {
    pub fn new(config: &ConnectivityConfig, initially_online: bool, events: QueueEventBus) -> Self {
        let (online, _) = watch::channel(initially_online);
        Self {
            online,
            samples: Mutex::new(VecDeque::with_capacity(config.sample_window)),
            window: config.sample_window.max(1),
            sample_ttl: config.sample_ttl(),
            failure_ratio_threshold: config.failure_ratio_threshold,
            slow_latency: config.slow_latency(),
            events,
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Applies a platform reachability signal. Returns whether the flag
    /// changed. Coming back online starts a fresh sample window.
    pub async fn set_online(&self, online: bool) -> bool {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                self.samples.lock().await.clear();
            }
            tracing::info!(online, "connectivity changed");
            self.events.publish(QueueEvent::ConnectivityChanged { online });
        }
        changed
    }

    pub async fn record_success(&self, latency: Duration) {
        self.push(Sample {
            at: Instant::now(),
            ok: true,
            latency: Some(latency),
        })
        .await;
    }

    pub async fn record_failure(&self) {
        self.push(Sample {
            at: Instant::now(),
            ok: false,
            latency: None,
        })
        .await;
    }

    /// Nominally online, but recent requests failed too often or were slow.
    pub async fn is_unstable(&self) -> bool {
        if !self.is_online() {
            return false;
        }
        let summary = self.summarize().await;
        self.is_failing(&summary) || self.is_slow(&summary)
    }

    pub async fn quality(&self) -> ConnectionQuality {
        if !self.is_online() {
            return ConnectionQuality::Offline;
        }
        let summary = self.summarize().await;
        if self.is_failing(&summary) {
            ConnectionQuality::Poor
        } else if summary.failures > 0 || self.is_slow(&summary) {
            ConnectionQuality::Fair
        } else {
            ConnectionQuality::Good
        }
    }

    /// Transition notifications. Rapid flaps coalesce into the latest value.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    async fn push(&self, sample: Sample) {
        let mut samples = self.samples.lock().await;
        samples.push_back(sample);
        while samples.len() > self.window {
            samples.pop_front();
        }
    }

    async fn summarize(&self) -> SampleSummary {
        let mut samples = self.samples.lock().await;
        let now = Instant::now();
        samples.retain(|sample| now.duration_since(sample.at) <= self.sample_ttl);

        let mut summary = SampleSummary {
            total: samples.len(),
            failures: 0,
            slow: 0,
        };
        for sample in samples.iter() {
            if !sample.ok {
                summary.failures += 1;
            } else if sample.latency.is_some_and(|latency| latency >= self.slow_latency) {
                summary.slow += 1;
            }
        }
        summary
    }

    fn is_failing(&self, summary: &SampleSummary) -> bool {
        summary.failures > 0 && summary.failure_ratio() >= self.failure_ratio_threshold
    }

    // majority of successful samples were slow
    fn is_slow(&self, summary: &SampleSummary) -> bool {
        let successes = summary.total - summary.failures;
        successes > 0 && summary.slow * 2 > successes
    }
}
