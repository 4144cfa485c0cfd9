use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, String> {
        Self::with_accuracy(lat, lng, None)
    }

    pub fn with_accuracy(lat: f64, lng: f64, accuracy: Option<f64>) -> Result<Self, String> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(format!("Latitude out of range: {lat}"));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(format!("Longitude out of range: {lng}"));
        }
        if let Some(value) = accuracy
            && (!value.is_finite() || value < 0.0)
        {
            return Err(format!("Accuracy must be a non-negative number: {value}"));
        }
        Ok(Self { lat, lng, accuracy })
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::with_accuracy(1.0, 1.0, Some(-3.0)).is_err());
    }

    #[test]
    fn test_distance_between_known_points() {
        // one degree of latitude is roughly 111.2 km
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(1.0, 0.0).unwrap();
        let d = a.distance_to(&b);
        assert!((d - 111_195.0).abs() < 100.0, "distance was {d}");
        assert_eq!(a.distance_to(&a), 0.0);
    }
}
