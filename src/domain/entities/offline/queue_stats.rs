use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-status counts over the queue. Derived on demand, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: u64,
    pub syncing: u64,
    pub synced: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub oldest_pending_at: Option<DateTime<Utc>>,
    pub newest_pending_at: Option<DateTime<Utc>>,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.syncing + self.synced + self.failed + self.cancelled
    }

    pub fn has_pending_work(&self) -> bool {
        self.pending > 0
    }

    pub fn needs_attention(&self) -> bool {
        self.failed > 0
    }
}
