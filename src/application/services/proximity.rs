use crate::application::ports::reference_cache::ReferenceCache;
use crate::domain::entities::{CachedSchool, SCHOOLS_COLLECTION};
use crate::domain::value_objects::{GeoPoint, SchoolId};
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityCheck {
    Within { distance_m: f64 },
    TooFar { distance_m: f64, radius_m: f64 },
    /// The school is not in the local cache; nothing to compare against.
    Unknown,
}

/// Distance to the school, minus the reported GPS accuracy.
pub fn check_distance(school: &CachedSchool, location: &GeoPoint, radius_m: f64) -> ProximityCheck {
    let distance_m = school.location.distance_to(location);
    let effective = (distance_m - location.accuracy.unwrap_or(0.0)).max(0.0);
    if effective <= radius_m {
        ProximityCheck::Within { distance_m }
    } else {
        ProximityCheck::TooFar {
            distance_m,
            radius_m,
        }
    }
}

pub async fn check_against_cache(
    cache: &dyn ReferenceCache,
    school_id: &SchoolId,
    location: &GeoPoint,
    radius_m: f64,
) -> Result<ProximityCheck, AppError> {
    let Some(entry) = cache.get(SCHOOLS_COLLECTION, school_id.as_str()).await? else {
        return Ok(ProximityCheck::Unknown);
    };

    match serde_json::from_value::<CachedSchool>(entry.data) {
        Ok(school) => Ok(check_distance(&school, location, radius_m)),
        Err(err) => {
            tracing::warn!(school_id = %school_id, "ignoring unreadable cached school: {err}");
            Ok(ProximityCheck::Unknown)
        }
    }
}

/// Fails with a validation error when the location is out of range.
pub async fn ensure_near_school(
    cache: &dyn ReferenceCache,
    school_id: &SchoolId,
    location: &GeoPoint,
    radius_m: f64,
) -> Result<(), AppError> {
    match check_against_cache(cache, school_id, location, radius_m).await? {
        ProximityCheck::TooFar {
            distance_m,
            radius_m,
        } => Err(AppError::ValidationError(format!(
            "location is {distance_m:.0}m from school {school_id}, allowed radius is {radius_m:.0}m"
        ))),
        ProximityCheck::Within { .. } | ProximityCheck::Unknown => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ReferenceEntry;
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::SqliteReferenceCache;
    use chrono::Utc;

    fn school() -> CachedSchool {
        CachedSchool {
            id: SchoolId::new("school-1").unwrap(),
            name: "Lincoln Elementary".to_string(),
            location: GeoPoint::new(40.0, -75.0).unwrap(),
        }
    }

    #[test]
    fn test_accuracy_widens_the_radius() {
        // about 222m north of the school
        let location = GeoPoint::new(40.002, -75.0).unwrap();
        assert!(matches!(
            check_distance(&school(), &location, 150.0),
            ProximityCheck::TooFar { .. }
        ));

        let fuzzy = GeoPoint::with_accuracy(40.002, -75.0, Some(100.0)).unwrap();
        assert!(matches!(
            check_distance(&school(), &fuzzy, 150.0),
            ProximityCheck::Within { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_school_is_not_validated() {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let cache = SqliteReferenceCache::new(pool);
        let far_away = GeoPoint::new(0.0, 0.0).unwrap();

        let school_id = SchoolId::new("school-1").unwrap();
        assert!(ensure_near_school(&cache, &school_id, &far_away, 150.0).await.is_ok());

        cache
            .put(&ReferenceEntry {
                collection: SCHOOLS_COLLECTION.to_string(),
                key: "school-1".to_string(),
                data: serde_json::to_value(school()).unwrap(),
                cached_at: Utc::now(),
                expires_at: None,
            })
            .await
            .unwrap();
        let err = ensure_near_school(&cache, &school_id, &far_away, 150.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
