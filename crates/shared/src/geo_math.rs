//! Great-circle math on WGS84 latitude/longitude pairs.
//!
//! Everything here is pure and infallible. Callers that accept coordinates
//! from the outside world check them with [`is_valid_coordinate`] first;
//! the functions below do not reject out-of-range input.

use geo::{HaversineBearing, HaversineDestination, Point};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Earth radius used for distance calculations, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A point on the Earth's surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    #[validate(custom(function = "crate::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "crate::validation::validate_longitude"))]
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    fn from_point(point: Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Haversine great-circle distance between two coordinates, in meters.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `from` to `to`, in degrees within `[0, 360)`.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    let raw = from.to_point().haversine_bearing(to.to_point());
    let normalized = raw.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// The point reached by travelling `distance_meters` from `origin` along
/// the initial bearing `bearing_degrees`.
pub fn destination_point(origin: Coordinate, bearing_degrees: f64, distance_meters: f64) -> Coordinate {
    let point = origin
        .to_point()
        .haversine_destination(bearing_degrees, distance_meters);
    normalize(Coordinate::from_point(point))
}

/// Returns true when both components are finite and within range.
pub fn is_valid_coordinate(c: Coordinate) -> bool {
    c.latitude.is_finite()
        && c.longitude.is_finite()
        && (-90.0..=90.0).contains(&c.latitude)
        && (-180.0..=180.0).contains(&c.longitude)
}

/// Clamps latitude into `[-90, 90]` and wraps longitude into `[-180, 180]`.
///
/// Longitudes already in range are returned untouched, so `180.0` stays
/// `180.0`. Non-finite components are passed through unchanged.
pub fn normalize(c: Coordinate) -> Coordinate {
    let latitude = c.latitude.clamp(-90.0, 90.0);
    let longitude = if (-180.0..=180.0).contains(&c.longitude) || !c.longitude.is_finite() {
        c.longitude
    } else {
        (c.longitude + 180.0).rem_euclid(360.0) - 180.0
    };
    Coordinate::new(latitude, longitude)
}
