use crate::domain::value_objects::{ActionId, ActionPayload, ActionStatus, ActionType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedAction {
    pub id: ActionId,
    pub action_type: ActionType,
    pub payload: ActionPayload,
    pub user_id: UserId,
    pub status: ActionStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// An earlier action that must be synced before this one is sent.
    pub depends_on: Option<ActionId>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueuedAction {
    pub fn from_draft(draft: QueuedActionDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: ActionId::generate(),
            action_type: draft.action_type,
            payload: draft.payload,
            user_id: draft.user_id,
            status: ActionStatus::Pending,
            retry_count: 0,
            last_error: None,
            depends_on: draft.depends_on,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, ActionStatus::Pending | ActionStatus::Failed)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.payload.get_str("sessionId")
    }
}

/// Input to `ActionQueue::enqueue`.
#[derive(Debug, Clone)]
pub struct QueuedActionDraft {
    pub action_type: ActionType,
    pub payload: ActionPayload,
    pub user_id: UserId,
    pub depends_on: Option<ActionId>,
    pub metadata: Option<Value>,
}

impl QueuedActionDraft {
    pub fn new(action_type: ActionType, payload: ActionPayload, user_id: UserId) -> Self {
        Self {
            action_type,
            payload,
            user_id,
            depends_on: None,
            metadata: None,
        }
    }

    pub fn depends_on(mut self, id: Option<ActionId>) -> Self {
        self.depends_on = id;
        self
    }
}
