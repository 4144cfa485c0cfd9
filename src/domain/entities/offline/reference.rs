use crate::domain::value_objects::{GeoPoint, SchoolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHOOLS_COLLECTION: &str = "schools";
pub const SESSIONS_COLLECTION: &str = "sessions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSchool {
    pub id: SchoolId,
    pub name: String,
    pub location: GeoPoint,
}

/// One cached snapshot of a reference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub collection: String,
    pub key: String,
    pub data: Value,
    pub cached_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReferenceEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}
