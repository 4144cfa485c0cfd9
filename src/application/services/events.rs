use crate::domain::entities::{DrainSummary, QueueStats};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QueueEvent {
    ConnectivityChanged { online: bool },
    StatsUpdated(QueueStats),
    DrainFinished(DrainSummary),
}

/// Fan-out of queue events to UI subscribers. Slow subscribers lose the
/// oldest events.
#[derive(Debug, Clone)]
pub struct QueueEventBus {
    sender: broadcast::Sender<QueueEvent>,
}

impl QueueEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: QueueEvent) {
        // no receivers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }
}

impl Default for QueueEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
