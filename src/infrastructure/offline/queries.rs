pub(super) const ACTION_COLUMNS: &str = "id, action_type, payload, user_id, status, retry_count, \
     last_error, depends_on, metadata, created_at, updated_at";

pub(super) const INSERT_ACTION: &str = r#"
    INSERT INTO queued_actions (
        id, action_type, payload, user_id, status, retry_count,
        last_error, depends_on, metadata, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

pub(super) const SELECT_ACTION_BY_ID: &str = r#"
    SELECT id, action_type, payload, user_id, status, retry_count,
           last_error, depends_on, metadata, created_at, updated_at
    FROM queued_actions
    WHERE id = ?1
"#;

pub(super) const DELETE_TERMINAL_BEFORE: &str = r#"
    DELETE FROM queued_actions
    WHERE status IN ('synced', 'cancelled')
      AND updated_at < ?1
"#;

pub(super) const UPSERT_REFERENCE_ENTRY: &str = r#"
    INSERT INTO reference_cache (collection, cache_key, data, cached_at, expires_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(collection, cache_key) DO UPDATE SET
        data = excluded.data,
        cached_at = excluded.cached_at,
        expires_at = excluded.expires_at
"#;

pub(super) const SELECT_REFERENCE_ENTRY: &str = r#"
    SELECT collection, cache_key, data, cached_at, expires_at
    FROM reference_cache
    WHERE collection = ?1 AND cache_key = ?2
      AND (expires_at IS NULL OR expires_at > ?3)
"#;

pub(super) const SELECT_REFERENCE_COLLECTION: &str = r#"
    SELECT collection, cache_key, data, cached_at, expires_at
    FROM reference_cache
    WHERE collection = ?1
      AND (expires_at IS NULL OR expires_at > ?2)
    ORDER BY cache_key ASC
"#;

pub(super) const DELETE_EXPIRED_REFERENCES: &str = r#"
    DELETE FROM reference_cache
    WHERE expires_at IS NOT NULL AND expires_at <= ?1
"#;

/// `?1, ?2, ...` placeholders starting at `start`.
pub(super) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}
