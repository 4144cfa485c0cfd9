use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
    Cancelled,
}

impl ActionStatus {
    pub const ALL: [ActionStatus; 5] = [
        ActionStatus::Pending,
        ActionStatus::Syncing,
        ActionStatus::Synced,
        ActionStatus::Failed,
        ActionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Syncing => "syncing",
            ActionStatus::Synced => "synced",
            ActionStatus::Failed => "failed",
            ActionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Synced | ActionStatus::Cancelled)
    }

    /// Whether the transition `self -> next` is an edge of the action state
    /// machine. Staying in the same state is not an edge.
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, next),
            (Pending, Syncing)
                | (Pending, Cancelled)
                | (Syncing, Synced)
                | (Syncing, Failed)
                | (Syncing, Pending)
                | (Failed, Pending)
                | (Failed, Cancelled)
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActionStatus::Pending),
            "syncing" => Ok(ActionStatus::Syncing),
            "synced" => Ok(ActionStatus::Synced),
            "failed" => Ok(ActionStatus::Failed),
            "cancelled" => Ok(ActionStatus::Cancelled),
            other => Err(format!("Unknown action status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ActionStatus::*;
    use super::*;

    #[test]
    fn test_terminal_states_accept_nothing() {
        for next in ActionStatus::ALL {
            assert!(!Synced.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_pending_cannot_skip_to_synced() {
        assert!(!Pending.can_transition_to(Synced));
        assert!(!Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Syncing));
    }

    #[test]
    fn test_synced_never_returns_to_pending() {
        assert!(!Synced.can_transition_to(Pending));
        assert!(Syncing.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_round_trips_through_str() {
        for status in ActionStatus::ALL {
            assert_eq!(status.as_str().parse::<ActionStatus>(), Ok(status));
        }
        assert!("done".parse::<ActionStatus>().is_err());
    }
}
