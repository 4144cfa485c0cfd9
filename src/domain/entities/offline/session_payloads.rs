use crate::domain::value_objects::{GeoPoint, SchoolId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a check-in, sent to the remote create-session operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInPayload {
    pub session_id: SessionId,
    pub school_id: SchoolId,
    pub user_id: UserId,
    pub location: GeoPoint,
    pub client_timestamp: DateTime<Utc>,
}

/// Body of a check-out, sent to the remote update-session operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutPayload {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub location: GeoPoint,
    pub client_timestamp: DateTime<Utc>,
}

/// What the remote side answered for an applied action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReceipt {
    #[serde(default)]
    pub remote_id: Option<String>,
}
