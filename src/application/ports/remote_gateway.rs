use crate::domain::entities::{CheckInPayload, CheckOutPayload, RemoteReceipt};
use crate::domain::value_objects::{ActionId, ActionPayload};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Transport failure or timeout. Worth retrying.
    #[error("Transient sync failure: {reason}")]
    Transient { reason: String },

    /// The remote side rejected the request itself.
    #[error("Remote rejected action: {reason}")]
    Permanent { reason: String },
}

impl SyncError {
    pub fn transient(reason: impl Into<String>) -> Self {
        SyncError::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        SyncError::Permanent {
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transient { .. })
    }
}

/// Remote service boundary. One operation per action type.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn create_session(&self, payload: &CheckInPayload) -> Result<RemoteReceipt, SyncError>;

    async fn update_session(&self, payload: &CheckOutPayload)
    -> Result<RemoteReceipt, SyncError>;

    /// `action_id` keys the request so a resend is applied at most once.
    async fn dispatch_custom(
        &self,
        action_id: &ActionId,
        action_type: &str,
        payload: &ActionPayload,
    ) -> Result<RemoteReceipt, SyncError>;
}
