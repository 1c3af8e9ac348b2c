//! Region repository: the armed geofence-region snapshot.

use std::sync::Arc;

use domain::models::GeofenceRegion;

use crate::entities::RegionEntity;
use crate::metrics::StoreTimer;
use crate::{KeyValueStore, PersistenceError};

/// Storage key of the armed-region array.
pub const REGIONS_KEY: &str = "geofence.regions";

/// Repository for the persisted set of armed geofence regions.
#[derive(Clone)]
pub struct RegionRepository {
    store: Arc<dyn KeyValueStore>,
}

impl RegionRepository {
    /// Creates a new RegionRepository backed by the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the armed-region snapshot. A missing snapshot is an empty set.
    pub async fn load(&self) -> Result<Vec<GeofenceRegion>, PersistenceError> {
        let timer = StoreTimer::new("load_regions");
        let raw = self.store.get(REGIONS_KEY).await;
        timer.record();

        let Some(raw) = raw? else {
            return Ok(Vec::new());
        };

        let entities: Vec<RegionEntity> =
            serde_json::from_str(&raw).map_err(|e| PersistenceError::Corrupt {
                key: REGIONS_KEY.to_string(),
                reason: e.to_string(),
            })?;

        Ok(entities.into_iter().map(GeofenceRegion::from).collect())
    }

    /// Replace the stored snapshot with `regions`.
    pub async fn save(&self, regions: &[GeofenceRegion]) -> Result<(), PersistenceError> {
        let entities: Vec<RegionEntity> = regions.iter().map(RegionEntity::from).collect();
        let json = serde_json::to_string(&entities)?;

        let timer = StoreTimer::new("save_regions");
        let result = self.store.set(REGIONS_KEY, &json).await;
        match result {
            Ok(()) => timer.record(),
            Err(_) => timer.record_failure(),
        }
        result
    }

    /// Delete the stored snapshot.
    pub async fn clear(&self) -> Result<(), PersistenceError> {
        self.store.remove(REGIONS_KEY).await
    }
}
