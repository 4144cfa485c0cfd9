use crate::domain::value_objects::ActionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainSkipReason {
    Offline,
    Unstable,
    AlreadyRunning,
    BackingOff,
}

/// Counts for one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    /// Actions a dispatch was attempted for.
    pub processed: u32,
    pub synced: u32,
    /// Actions escalated to `failed` during this pass.
    pub failed: u32,
    /// Transient failures put back to `pending` for a later pass.
    pub requeued: u32,
    /// Actions left untouched because their dependency is not synced yet.
    pub deferred: u32,
    /// Deferred actions whose dependency has `failed`. They stay parked
    /// until that dependency is retried.
    pub parked: Vec<ActionId>,
    /// Actions whose bookkeeping hit a store error. The pass moved on.
    pub errors: u32,
    pub skipped: Option<DrainSkipReason>,
}

impl DrainSummary {
    pub fn skipped(reason: DrainSkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn had_transient_failures(&self) -> bool {
        self.requeued > 0
    }
}
