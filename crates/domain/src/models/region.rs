//! Geofence region models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Coordinate;

/// A circular region registered with the platform's region monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceRegion {
    pub identifier: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
}

impl GeofenceRegion {
    pub fn new(identifier: impl Into<String>, center: Coordinate, radius: f64) -> Self {
        Self {
            identifier: identifier.into(),
            latitude: center.latitude,
            longitude: center.longitude,
            radius,
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Emitted when the device enters an armed region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEnterEvent {
    pub region_id: String,
    pub coordinate: Coordinate,
    pub radius: f64,
    pub timestamp: DateTime<Utc>,
}

impl RegionEnterEvent {
    pub fn for_region(region: &GeofenceRegion, timestamp: DateTime<Utc>) -> Self {
        Self {
            region_id: region.identifier.clone(),
            coordinate: region.center(),
            radius: region.radius,
            timestamp,
        }
    }
}
