use super::rows::{QueuedActionRow, ReferenceEntryRow};
use crate::domain::entities::{QueuedAction, ReferenceEntry};
use crate::domain::value_objects::{ActionId, ActionPayload, ActionStatus, ActionType, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub fn queued_action_from_row(row: QueuedActionRow) -> Result<QueuedAction, AppError> {
    let id = ActionId::new(row.id).map_err(AppError::DeserializationError)?;
    let payload = ActionPayload::from_json_str(&row.payload).map_err(AppError::DeserializationError)?;
    let user_id = UserId::new(row.user_id).map_err(AppError::DeserializationError)?;
    let status = row
        .status
        .parse::<ActionStatus>()
        .map_err(AppError::DeserializationError)?;
    let depends_on = row
        .depends_on
        .map(|value| ActionId::new(value).map_err(AppError::DeserializationError))
        .transpose()?;
    let metadata = row
        .metadata
        .map(|json| {
            serde_json::from_str(&json)
                .map_err(|err| AppError::DeserializationError(err.to_string()))
        })
        .transpose()?;
    let retry_count = u32::try_from(row.retry_count)
        .map_err(|_| AppError::DeserializationError("retry_count out of range".to_string()))?;

    Ok(QueuedAction {
        id,
        action_type: ActionType::from(row.action_type),
        payload,
        user_id,
        status,
        retry_count,
        last_error: row.last_error,
        depends_on,
        metadata,
        created_at: millis_to_datetime(row.created_at)?,
        updated_at: millis_to_datetime(row.updated_at)?,
    })
}

pub fn reference_entry_from_row(row: ReferenceEntryRow) -> Result<ReferenceEntry, AppError> {
    let data = serde_json::from_str(&row.data)
        .map_err(|err| AppError::DeserializationError(err.to_string()))?;

    Ok(ReferenceEntry {
        collection: row.collection,
        key: row.cache_key,
        data,
        cached_at: millis_to_datetime(row.cached_at)?,
        expires_at: row.expires_at.map(millis_to_datetime).transpose()?,
    })
}

pub fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::DeserializationError(format!("Invalid timestamp: {millis}")))
}
