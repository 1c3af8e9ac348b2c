//! Alarm repository: the active-alarm snapshot.

use std::sync::Arc;

use domain::models::Alarm;

use crate::entities::AlarmEntity;
use crate::metrics::StoreTimer;
use crate::{KeyValueStore, PersistenceError};

/// Storage key of the active-alarm array.
pub const ALARMS_KEY: &str = "alarms.active";

/// Repository for the persisted active-alarm set.
///
/// The whole set is written as one JSON array per save; there are no
/// per-alarm writes, so a save either stores the complete new snapshot
/// or leaves the previous one in place.
#[derive(Clone)]
pub struct AlarmRepository {
    store: Arc<dyn KeyValueStore>,
}

impl AlarmRepository {
    /// Creates a new AlarmRepository backed by the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the active-alarm snapshot. A missing snapshot is an empty set.
    pub async fn load(&self) -> Result<Vec<Alarm>, PersistenceError> {
        let timer = StoreTimer::new("load_alarms");
        let raw = match self.store.get(ALARMS_KEY).await {
            Ok(raw) => raw,
            Err(e) => {
                timer.record_failure();
                return Err(e);
            }
        };
        timer.record();

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        let entities: Vec<AlarmEntity> =
            serde_json::from_str(&raw).map_err(|e| PersistenceError::Corrupt {
                key: ALARMS_KEY.to_string(),
                reason: e.to_string(),
            })?;

        entities
            .into_iter()
            .map(Alarm::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| PersistenceError::Corrupt {
                key: ALARMS_KEY.to_string(),
                reason,
            })
    }

    /// Replace the stored snapshot with `alarms`.
    pub async fn save(&self, alarms: &[Alarm]) -> Result<(), PersistenceError> {
        let entities: Vec<AlarmEntity> = alarms.iter().map(AlarmEntity::from).collect();
        let json = serde_json::to_string(&entities)?;

        let timer = StoreTimer::new("save_alarms");
        let result = self.store.set(ALARMS_KEY, &json).await;
        match result {
            Ok(()) => timer.record(),
            Err(_) => timer.record_failure(),
        }
        result
    }

    /// Delete the stored snapshot.
    pub async fn clear(&self) -> Result<(), PersistenceError> {
        let timer = StoreTimer::new("clear_alarms");
        let result = self.store.remove(ALARMS_KEY).await;
        timer.record();
        result
    }
}
