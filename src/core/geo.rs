// Pure geospatial math: great-circle distance and geofence containment

use crate::core::errors::AttendanceError;
use crate::core::models::Coordinate;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A circular geofence: attendance actions are only valid inside it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Geofence {
    pub center: Coordinate,
    pub radius_m: f64,
}

impl Geofence {
    /// True iff `point` lies within the fence. A point at exactly the
    /// radius is within.
    pub fn contains(&self, point: &Coordinate) -> Result<bool, AttendanceError> {
        is_within(&self.center, self.radius_m, point)
    }
}

/// Validate a coordinate pair: latitude in [-90, 90], longitude in
/// [-180, 180], neither NaN.
pub fn validate_coordinate(point: &Coordinate) -> Result<(), AttendanceError> {
    if point.lat.is_nan() || point.lng.is_nan() {
        return Err(AttendanceError::InvalidInput(
            "coordinate is not a number".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&point.lat) {
        return Err(AttendanceError::InvalidInput(format!(
            "latitude {} outside [-90, 90]",
            point.lat
        )));
    }
    if !(-180.0..=180.0).contains(&point.lng) {
        return Err(AttendanceError::InvalidInput(format!(
            "longitude {} outside [-180, 180]",
            point.lng
        )));
    }
    Ok(())
}

/// Great-circle (haversine) distance between two coordinates, in meters.
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> Result<f64, AttendanceError> {
    validate_coordinate(a)?;
    validate_coordinate(b)?;

    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    Ok(EARTH_RADIUS_M * c)
}

/// True iff `point` is at most `radius_m` meters from `center`.
pub fn is_within(
    center: &Coordinate,
    radius_m: f64,
    point: &Coordinate,
) -> Result<bool, AttendanceError> {
    Ok(distance_meters(center, point)? <= radius_m)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Coordinate = Coordinate {
        lat: -32.9198,
        lng: -60.7068,
    };

    #[test]
    fn test_distance_is_symmetric() {
        let a = Coordinate {
            lat: 40.7128,
            lng: -74.0060,
        };
        let b = Coordinate {
            lat: 51.5074,
            lng: -0.1278,
        };
        let ab = distance_meters(&a, &b).unwrap();
        let ba = distance_meters(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = Coordinate {
            lat: -32.9198,
            lng: -60.7068,
        };
        assert_eq!(distance_meters(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_point_inside_office_fence() {
        // ~80m west of the office center
        let near = Coordinate {
            lat: -32.9198,
            lng: -60.7077,
        };
        let d = distance_meters(&CENTER, &near).unwrap();
        assert!(d > 60.0 && d < 100.0, "expected ~80m, got {}", d);
        assert!(is_within(&CENTER, 100.0, &near).unwrap());
    }

    #[test]
    fn test_point_outside_office_fence() {
        // ~580m south of the office center
        let far = Coordinate {
            lat: -32.9250,
            lng: -60.7068,
        };
        let d = distance_meters(&CENTER, &far).unwrap();
        assert!(d > 500.0 && d < 700.0, "expected ~580m, got {}", d);
        assert!(!is_within(&CENTER, 100.0, &far).unwrap());
    }

    #[test]
    fn test_boundary_point_is_within() {
        let a = Coordinate { lat: 0.0, lng: 0.0 };
        let b = Coordinate { lat: 0.0, lng: 0.001 };
        let r = distance_meters(&a, &b).unwrap();
        assert!(is_within(&a, r, &b).unwrap());
    }

    #[test]
    fn test_invalid_latitude_rejected() {
        let bad = Coordinate {
            lat: 91.0,
            lng: 0.0,
        };
        let ok = Coordinate { lat: 0.0, lng: 0.0 };
        assert!(matches!(
            distance_meters(&bad, &ok),
            Err(AttendanceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_longitude_rejected() {
        let bad = Coordinate {
            lat: 0.0,
            lng: -180.5,
        };
        let ok = Coordinate { lat: 0.0, lng: 0.0 };
        assert!(matches!(
            is_within(&ok, 10.0, &bad),
            Err(AttendanceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_nan_rejected() {
        let bad = Coordinate {
            lat: f64::NAN,
            lng: 0.0,
        };
        let ok = Coordinate { lat: 0.0, lng: 0.0 };
        assert!(distance_meters(&ok, &bad).is_err());
    }
}
