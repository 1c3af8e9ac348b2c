//! Geofence region entity (stored JSON record).

use serde::{Deserialize, Serialize};

use domain::models::GeofenceRegion;

/// Stored form of an armed region: `{identifier, latitude, longitude, radius}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntity {
    pub identifier: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

impl From<&GeofenceRegion> for RegionEntity {
    fn from(region: &GeofenceRegion) -> Self {
        Self {
            identifier: region.identifier.clone(),
            latitude: region.latitude,
            longitude: region.longitude,
            radius: region.radius,
        }
    }
}

impl From<RegionEntity> for GeofenceRegion {
    fn from(entity: RegionEntity) -> Self {
        Self {
            identifier: entity.identifier,
            latitude: entity.latitude,
            longitude: entity.longitude,
            radius: entity.radius,
        }
    }
}
