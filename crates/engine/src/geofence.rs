//! Geofence adapter: OS circular-region monitoring for alarm destinations.
//!
//! Armed regions are persisted so that after a process restart
//! [`GeofenceAdapter::initialize`] restores the in-memory set before any
//! new arm/disarm is served. Regions are one-shot: an enter event is
//! forwarded to the registered handler and the region is then disarmed,
//! whatever the handler did.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use domain::models::{
    GeofenceRegion, RegionEnterEvent, MAX_TRIGGER_RADIUS_METERS, MIN_TRIGGER_RADIUS_METERS,
};
use domain::AlarmError;
use persistence::repositories::RegionRepository;
use shared::{geo_math, Coordinate};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PLATFORM_REGION_LIMIT;
use crate::providers::{LocationProvider, PlatformError, RegionMonitor};

/// Errors raised when arming a region.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    #[error("Invalid coordinates for geofence")]
    InvalidCoordinates,

    #[error("Geofence radius {0} must be between 50 and 2000 meters")]
    InvalidRadius(f64),

    #[error("Foreground and background location permission are required for geofencing")]
    PermissionDenied,

    #[error("Cannot arm more than {limit} geofences")]
    CapacityExceeded { limit: usize },

    #[error("Geofencing unavailable: {0}")]
    Unavailable(String),
}

impl From<GeofenceError> for AlarmError {
    fn from(err: GeofenceError) -> Self {
        match err {
            GeofenceError::InvalidCoordinates | GeofenceError::InvalidRadius(_) => {
                AlarmError::InvalidInput(err.to_string())
            }
            GeofenceError::PermissionDenied => AlarmError::PermissionDenied(err.to_string()),
            GeofenceError::CapacityExceeded { limit } => AlarmError::CapacityExceeded { limit },
            GeofenceError::Unavailable(msg) => AlarmError::ServicesUnavailable(msg),
        }
    }
}

impl From<PlatformError> for GeofenceError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::PermissionDenied(_) => GeofenceError::PermissionDenied,
            PlatformError::Unavailable(msg) | PlatformError::Other(msg) => {
                GeofenceError::Unavailable(msg)
            }
        }
    }
}

/// Receives region enter events.
#[async_trait::async_trait]
pub trait RegionEventHandler: Send + Sync {
    async fn on_region_enter(&self, event: RegionEnterEvent) -> Result<(), AlarmError>;
}

#[derive(Debug, Default)]
struct GeofenceState {
    initialized: bool,
    regions: BTreeMap<String, GeofenceRegion>,
}

/// Wraps the platform region monitor with validation, a capacity ceiling,
/// persistence and one-shot enter semantics.
pub struct GeofenceAdapter {
    monitor: Arc<dyn RegionMonitor>,
    location: Arc<dyn LocationProvider>,
    repository: RegionRepository,
    max_regions: usize,
    state: Mutex<GeofenceState>,
    handler: RwLock<Option<Arc<dyn RegionEventHandler>>>,
}

impl std::fmt::Debug for GeofenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceAdapter")
            .field("max_regions", &self.max_regions)
            .finish_non_exhaustive()
    }
}

impl GeofenceAdapter {
    /// `max_regions` is clamped to [`PLATFORM_REGION_LIMIT`].
    pub fn new(
        monitor: Arc<dyn RegionMonitor>,
        location: Arc<dyn LocationProvider>,
        repository: RegionRepository,
        max_regions: usize,
    ) -> Self {
        Self {
            monitor,
            location,
            repository,
            max_regions: max_regions.min(PLATFORM_REGION_LIMIT),
            state: Mutex::new(GeofenceState::default()),
            handler: RwLock::new(None),
        }
    }

    /// Restore the armed-region set from storage and re-register it with
    /// the platform. Idempotent. Returns the number of restored regions.
    ///
    /// A corrupt snapshot is discarded and treated as "no regions".
    pub async fn initialize(&self) -> Result<usize, AlarmError> {
        let mut state = self.state.lock().await;
        self.load_locked(&mut state).await?;
        Ok(state.regions.len())
    }

    async fn load_locked(&self, state: &mut GeofenceState) -> Result<(), AlarmError> {
        if state.initialized {
            return Ok(());
        }

        let regions = match self.repository.load().await {
            Ok(regions) => regions,
            Err(e) if e.is_corrupt() => {
                warn!(error = %e, "Discarding corrupt geofence snapshot");
                if let Err(clear_err) = self.repository.clear().await {
                    warn!(error = %clear_err, "Failed to clear corrupt geofence snapshot");
                }
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        state.regions = regions
            .into_iter()
            .map(|r| (r.identifier.clone(), r))
            .collect();
        state.initialized = true;

        if !state.regions.is_empty() {
            let all: Vec<GeofenceRegion> = state.regions.values().cloned().collect();
            if let Err(e) = self.monitor.start_monitoring(&all).await {
                warn!(error = %e, regions = all.len(), "Failed to re-register restored geofences");
            }
        }

        info!(regions = state.regions.len(), "Geofence adapter initialized");
        Ok(())
    }

    /// Arm a one-shot region around `coordinate`.
    ///
    /// Re-arming an existing `custom_id` replaces that region and does not
    /// count against the capacity ceiling.
    pub async fn arm(
        &self,
        coordinate: Coordinate,
        radius: f64,
        custom_id: Option<&str>,
    ) -> Result<String, GeofenceError> {
        if !geo_math::is_valid_coordinate(coordinate) {
            return Err(GeofenceError::InvalidCoordinates);
        }
        if !(MIN_TRIGGER_RADIUS_METERS..=MAX_TRIGGER_RADIUS_METERS).contains(&radius) {
            return Err(GeofenceError::InvalidRadius(radius));
        }

        let permissions = self.location.permissions().await;
        if !permissions.services_enabled {
            return Err(GeofenceError::Unavailable(
                "location services are disabled".to_string(),
            ));
        }
        if !(permissions.foreground && permissions.background) {
            return Err(GeofenceError::PermissionDenied);
        }
        if !self.monitor.is_available().await {
            return Err(GeofenceError::Unavailable(
                "region monitoring is not supported right now".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        self.load_locked(&mut state)
            .await
            .map_err(|e| GeofenceError::Unavailable(e.to_string()))?;

        let region_id = custom_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("geofence-{}", Uuid::new_v4()));

        if !state.regions.contains_key(&region_id) && state.regions.len() >= self.max_regions {
            return Err(GeofenceError::CapacityExceeded {
                limit: self.max_regions,
            });
        }

        let region = GeofenceRegion::new(region_id.clone(), coordinate, radius);
        let previous = state.regions.insert(region_id.clone(), region);

        let all: Vec<GeofenceRegion> = state.regions.values().cloned().collect();
        if let Err(e) = self.monitor.start_monitoring(&all).await {
            match previous {
                Some(previous) => state.regions.insert(region_id.clone(), previous),
                None => state.regions.remove(&region_id),
            };
            warn!(region_id = %region_id, error = %e, "Platform refused to monitor region");
            return Err(e.into());
        }

        self.persist_locked(&state).await;

        info!(
            region_id = %region_id,
            latitude = coordinate.latitude,
            longitude = coordinate.longitude,
            radius_m = radius,
            armed = state.regions.len(),
            "Geofence armed"
        );
        Ok(region_id)
    }

    /// Disarm a region. Unknown ids return `false`.
    pub async fn disarm(&self, region_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if let Err(e) = self.load_locked(&mut state).await {
            warn!(region_id = %region_id, error = %e, "Disarm before geofences could be restored");
            return false;
        }

        if state.regions.remove(region_id).is_none() {
            debug!(region_id = %region_id, "Disarm of unknown region ignored");
            return false;
        }

        self.sync_monitor_locked(&state).await;
        self.persist_locked(&state).await;

        info!(region_id = %region_id, armed = state.regions.len(), "Geofence disarmed");
        true
    }

    /// Disarm every region. Returns how many were armed.
    pub async fn disarm_all(&self) -> usize {
        let mut state = self.state.lock().await;
        if let Err(e) = self.load_locked(&mut state).await {
            warn!(error = %e, "Disarm-all before geofences could be restored");
        }

        let count = state.regions.len();
        state.regions.clear();
        if let Err(e) = self.monitor.stop_monitoring().await {
            warn!(error = %e, "Failed to stop region monitoring");
        }
        self.persist_locked(&state).await;

        if count > 0 {
            info!(disarmed = count, "All geofences disarmed");
        }
        count
    }

    /// Install the enter-event handler, replacing any previous one.
    pub async fn set_event_handler(&self, handler: Arc<dyn RegionEventHandler>) {
        *self.handler.write().await = Some(handler);
    }

    pub async fn clear_event_handler(&self) {
        *self.handler.write().await = None;
    }

    pub async fn has_event_handler(&self) -> bool {
        self.handler.read().await.is_some()
    }

    /// Entry point for the platform's "entered region" callback.
    ///
    /// Forwards the event to the handler, then disarms the region even if
    /// the handler failed or panicked. Returns `false` for unknown regions.
    pub async fn handle_region_enter(&self, region_id: &str) -> bool {
        let region = {
            let mut state = self.state.lock().await;
            if let Err(e) = self.load_locked(&mut state).await {
                warn!(region_id = %region_id, error = %e, "Enter event before geofences could be restored");
            }
            state.regions.get(region_id).cloned()
        };

        let Some(region) = region else {
            debug!(region_id = %region_id, "Enter event for unknown region ignored");
            return false;
        };

        let event = RegionEnterEvent::for_region(&region, Utc::now());
        let handler = self.handler.read().await.clone();

        match handler {
            Some(handler) => {
                let outcome =
                    tokio::spawn(async move { handler.on_region_enter(event).await }).await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(region_id = %region_id, error = %e, "Geofence event handler failed")
                    }
                    Err(e) => {
                        error!(region_id = %region_id, error = %e, "Geofence event handler panicked")
                    }
                }
            }
            None => warn!(region_id = %region_id, "Enter event with no handler installed"),
        }

        self.disarm(region_id).await;
        true
    }

    pub async fn is_armed(&self, region_id: &str) -> bool {
        self.state.lock().await.regions.contains_key(region_id)
    }

    pub async fn armed_count(&self) -> usize {
        self.state.lock().await.regions.len()
    }

    pub async fn armed_regions(&self) -> Vec<GeofenceRegion> {
        self.state.lock().await.regions.values().cloned().collect()
    }

    async fn sync_monitor_locked(&self, state: &GeofenceState) {
        let result = if state.regions.is_empty() {
            self.monitor.stop_monitoring().await
        } else {
            let all: Vec<GeofenceRegion> = state.regions.values().cloned().collect();
            self.monitor.start_monitoring(&all).await
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to update monitored regions");
        }
    }

    async fn persist_locked(&self, state: &GeofenceState) {
        let all: Vec<GeofenceRegion> = state.regions.values().cloned().collect();
        if let Err(e) = self.repository.save(&all).await {
            // The platform still has the region; the snapshot catches up on
            // the next successful write.
            warn!(error = %e, "Failed to persist geofence regions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::PermissionStatus;
    use crate::simulation::{SimulatedLocationProvider, SimulatedRegionMonitor};
    use persistence::repositories::REGIONS_KEY;
    use persistence::{InMemoryStore, KeyValueStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        store: Arc<InMemoryStore>,
        monitor: Arc<SimulatedRegionMonitor>,
        location: Arc<SimulatedLocationProvider>,
        adapter: GeofenceAdapter,
    }

    fn harness_with_store(store: Arc<InMemoryStore>) -> Harness {
        let monitor = Arc::new(SimulatedRegionMonitor::new());
        let location = Arc::new(SimulatedLocationProvider::new());
        let adapter = GeofenceAdapter::new(
            monitor.clone(),
            location.clone(),
            RegionRepository::new(store.clone()),
            3,
        );
        Harness {
            store,
            monitor,
            location,
            adapter,
        }
    }

    fn harness() -> Harness {
        harness_with_store(Arc::new(InMemoryStore::new()))
    }

    fn station() -> Coordinate {
        Coordinate::new(28.6328, 77.2197)
    }

    struct CountingHandler {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl RegionEventHandler for CountingHandler {
        async fn on_region_enter(&self, _event: RegionEnterEvent) -> Result<(), AlarmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AlarmError::Unknown("handler blew up".into()))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingHandler;

    #[async_trait::async_trait]
    impl RegionEventHandler for PanickingHandler {
        async fn on_region_enter(&self, _event: RegionEnterEvent) -> Result<(), AlarmError> {
            panic!("handler panicked");
        }
    }

    #[tokio::test]
    async fn test_arm_then_disarm_restores_count() {
        let h = harness();
        let before = h.adapter.armed_count().await;

        let id = h.adapter.arm(station(), 200.0, None).await.unwrap();
        assert!(id.starts_with("geofence-"));
        assert_eq!(h.adapter.armed_count().await, before + 1);
        assert_eq!(h.monitor.monitored_ids(), vec![id.clone()]);

        assert!(h.adapter.disarm(&id).await);
        assert_eq!(h.adapter.armed_count().await, before);
        assert!(h.monitor.monitored_ids().is_empty());
    }

    #[tokio::test]
    async fn test_arm_uses_custom_id() {
        let h = harness();
        let id = h.adapter.arm(station(), 200.0, Some("alarm-42")).await.unwrap();
        assert_eq!(id, "alarm-42");
        assert!(h.adapter.is_armed("alarm-42").await);
    }

    #[tokio::test]
    async fn test_arm_rejects_invalid_input() {
        let h = harness();
        assert_eq!(
            h.adapter.arm(Coordinate::new(91.0, 0.0), 200.0, None).await,
            Err(GeofenceError::InvalidCoordinates)
        );
        assert_eq!(
            h.adapter.arm(station(), 49.0, None).await,
            Err(GeofenceError::InvalidRadius(49.0))
        );
        assert_eq!(
            h.adapter.arm(station(), 2001.0, None).await,
            Err(GeofenceError::InvalidRadius(2001.0))
        );
        assert_eq!(h.adapter.armed_count().await, 0);
    }

    #[tokio::test]
    async fn test_arm_requires_background_permission() {
        let h = harness();
        h.location.set_permissions(PermissionStatus::foreground_only());
        assert_eq!(
            h.adapter.arm(station(), 200.0, None).await,
            Err(GeofenceError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_arm_unavailable_platform() {
        let h = harness();
        h.monitor.set_available(false);
        assert!(matches!(
            h.adapter.arm(station(), 200.0, None).await,
            Err(GeofenceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_arm_rolls_back_when_platform_refuses() {
        let h = harness();
        h.monitor.set_fail_start(true);
        assert!(h.adapter.arm(station(), 200.0, None).await.is_err());
        assert_eq!(h.adapter.armed_count().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_ceiling() {
        let h = harness();
        for i in 0..3 {
            h.adapter
                .arm(station(), 200.0, Some(&format!("r{i}")))
                .await
                .unwrap();
        }
        assert_eq!(
            h.adapter.arm(station(), 200.0, None).await,
            Err(GeofenceError::CapacityExceeded { limit: 3 })
        );
        // Re-arming an existing id is a replacement, not a new region.
        assert!(h.adapter.arm(station(), 300.0, Some("r1")).await.is_ok());
        assert_eq!(h.adapter.armed_count().await, 3);
    }

    #[tokio::test]
    async fn test_capacity_clamped_to_platform_limit() {
        let adapter = GeofenceAdapter::new(
            Arc::new(SimulatedRegionMonitor::new()),
            Arc::new(SimulatedLocationProvider::new()),
            RegionRepository::new(Arc::new(InMemoryStore::new())),
            100,
        );
        for i in 0..PLATFORM_REGION_LIMIT {
            adapter
                .arm(station(), 200.0, Some(&format!("r{i}")))
                .await
                .unwrap();
        }
        assert_eq!(
            adapter.arm(station(), 200.0, None).await,
            Err(GeofenceError::CapacityExceeded {
                limit: PLATFORM_REGION_LIMIT
            })
        );
    }

    #[tokio::test]
    async fn test_disarm_unknown_is_false() {
        let h = harness();
        assert!(!h.adapter.disarm("nope").await);
        let id = h.adapter.arm(station(), 200.0, None).await.unwrap();
        assert!(h.adapter.disarm(&id).await);
        assert!(!h.adapter.disarm(&id).await);
    }

    #[tokio::test]
    async fn test_disarm_all() {
        let h = harness();
        h.adapter.arm(station(), 200.0, None).await.unwrap();
        h.adapter.arm(station(), 300.0, None).await.unwrap();
        assert_eq!(h.adapter.disarm_all().await, 2);
        assert_eq!(h.adapter.armed_count().await, 0);
        assert!(h.monitor.monitored_ids().is_empty());
    }

    #[tokio::test]
    async fn test_regions_restored_after_restart() {
        let store = Arc::new(InMemoryStore::new());
        let id = {
            let h = harness_with_store(store.clone());
            h.adapter.arm(station(), 200.0, None).await.unwrap()
        };

        let h = harness_with_store(store);
        assert_eq!(h.adapter.initialize().await.unwrap(), 1);
        assert!(h.adapter.is_armed(&id).await);
        // Restored regions are handed back to the platform.
        assert_eq!(h.monitor.monitored_ids(), vec![id]);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_treated_as_empty() {
        let store = Arc::new(InMemoryStore::new());
        store.set(REGIONS_KEY, "garbage").await.unwrap();
        let h = harness_with_store(store);

        assert_eq!(h.adapter.initialize().await.unwrap(), 0);
        assert_eq!(h.store.get(REGIONS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_enter_event_forwards_then_disarms() {
        let h = harness();
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        h.adapter.set_event_handler(handler.clone()).await;
        let id = h.adapter.arm(station(), 200.0, None).await.unwrap();

        assert!(h.adapter.handle_region_enter(&id).await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(!h.adapter.is_armed(&id).await);

        // One-shot: a repeated event finds nothing.
        assert!(!h.adapter.handle_region_enter(&id).await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enter_event_disarms_when_handler_fails() {
        let h = harness();
        h.adapter
            .set_event_handler(Arc::new(CountingHandler {
                calls: AtomicUsize::new(0),
                fail: true,
            }))
            .await;
        let id = h.adapter.arm(station(), 200.0, None).await.unwrap();

        assert!(h.adapter.handle_region_enter(&id).await);
        assert!(!h.adapter.is_armed(&id).await);
    }

    #[tokio::test]
    async fn test_enter_event_disarms_when_handler_panics() {
        let h = harness();
        h.adapter.set_event_handler(Arc::new(PanickingHandler)).await;
        let id = h.adapter.arm(station(), 200.0, None).await.unwrap();

        assert!(h.adapter.handle_region_enter(&id).await);
        assert_eq!(h.adapter.armed_count().await, 0);
    }

    #[tokio::test]
    async fn test_handler_replacement() {
        let h = harness();
        let first = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let second = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        h.adapter.set_event_handler(first.clone()).await;
        h.adapter.set_event_handler(second.clone()).await;

        let id = h.adapter.arm(station(), 200.0, None).await.unwrap();
        h.adapter.handle_region_enter(&id).await;
        assert_eq!(first.calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);

        h.adapter.clear_event_handler().await;
        assert!(!h.adapter.has_event_handler().await);
    }
}
