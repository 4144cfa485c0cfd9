use crate::domain::value_objects::ActionStatus;
use serde::{Deserialize, Serialize};

/// Result of a status transition that did not violate the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    Applied { from: ActionStatus, to: ActionStatus },
    /// The action already was in the target state.
    Unchanged(ActionStatus),
}

impl TransitionOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    /// The action is already being sent; the request cannot be withdrawn.
    TooLate,
    AlreadyFinished(ActionStatus),
    NotFound,
}

impl CancelOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CancelOutcome::Cancelled => "action cancelled",
            CancelOutcome::TooLate => "action is already being synced and can no longer be cancelled",
            CancelOutcome::AlreadyFinished(_) => "action already finished",
            CancelOutcome::NotFound => "action not found",
        }
    }
}
