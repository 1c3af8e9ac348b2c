//! Simulated platform collaborators.
//!
//! Scriptable stand-ins for the OS location, region-monitoring and task
//! scheduling services. Used by the test suites and the demo binary.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use domain::models::GeofenceRegion;
use shared::{geo_math, Coordinate};

use crate::providers::{
    BackgroundTaskHost, LocationError, LocationProvider, PermissionStatus, PlatformError,
    RegionMonitor, TrackingOptions,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct LocationState {
    position: Option<Coordinate>,
    permissions: PermissionStatus,
    queued_errors: VecDeque<LocationError>,
    requests: usize,
}

/// Location provider whose position and failures are set by the caller.
#[derive(Debug)]
pub struct SimulatedLocationProvider {
    state: Mutex<LocationState>,
}

impl Default for SimulatedLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLocationProvider {
    /// All permissions granted, no fix yet.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LocationState {
                position: None,
                permissions: PermissionStatus::all_granted(),
                queued_errors: VecDeque::new(),
                requests: 0,
            }),
        }
    }

    pub fn set_position(&self, position: Coordinate) {
        lock(&self.state).position = Some(position);
    }

    pub fn clear_position(&self) {
        lock(&self.state).position = None;
    }

    pub fn set_permissions(&self, permissions: PermissionStatus) {
        lock(&self.state).permissions = permissions;
    }

    /// The next `current_position` call fails with `error`. Errors queue up.
    pub fn push_error(&self, error: LocationError) {
        lock(&self.state).queued_errors.push_back(error);
    }

    /// Number of `current_position` calls served so far.
    pub fn request_count(&self) -> usize {
        lock(&self.state).requests
    }
}

#[async_trait::async_trait]
impl LocationProvider for SimulatedLocationProvider {
    async fn current_position(&self) -> Result<Coordinate, LocationError> {
        let mut state = lock(&self.state);
        state.requests += 1;
        if let Some(err) = state.queued_errors.pop_front() {
            return Err(err);
        }
        if !state.permissions.services_enabled {
            return Err(LocationError::ServicesDisabled);
        }
        if !state.permissions.foreground {
            return Err(LocationError::PermissionDenied);
        }
        state
            .position
            .ok_or_else(|| LocationError::Unavailable("no fix yet".to_string()))
    }

    async fn last_known_position(&self) -> Option<Coordinate> {
        lock(&self.state).position
    }

    async fn permissions(&self) -> PermissionStatus {
        lock(&self.state).permissions
    }
}

/// Region monitor that records the monitored set.
#[derive(Debug)]
pub struct SimulatedRegionMonitor {
    available: AtomicBool,
    fail_start: AtomicBool,
    monitored: Mutex<Vec<GeofenceRegion>>,
    start_calls: AtomicUsize,
}

impl Default for SimulatedRegionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRegionMonitor {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            fail_start: AtomicBool::new(false),
            monitored: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
        }
    }

    /// A monitor reporting region monitoring as unsupported.
    pub fn unavailable() -> Self {
        let monitor = Self::new();
        monitor.set_available(false);
        monitor
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make `start_monitoring` fail while still reporting availability.
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Identifiers currently registered with the simulated OS.
    pub fn monitored_ids(&self) -> Vec<String> {
        lock(&self.monitored)
            .iter()
            .map(|r| r.identifier.clone())
            .collect()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Ids of monitored regions containing `position`, i.e. the regions
    /// the OS would report an enter event for.
    pub fn regions_containing(&self, position: Coordinate) -> Vec<String> {
        lock(&self.monitored)
            .iter()
            .filter(|r| geo_math::distance(r.center(), position) <= r.radius)
            .map(|r| r.identifier.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl RegionMonitor for SimulatedRegionMonitor {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn start_monitoring(&self, regions: &[GeofenceRegion]) -> Result<(), PlatformError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable(
                "simulated region monitoring failure".to_string(),
            ));
        }
        *lock(&self.monitored) = regions.to_vec();
        Ok(())
    }

    async fn stop_monitoring(&self) -> Result<(), PlatformError> {
        lock(&self.monitored).clear();
        Ok(())
    }
}

/// Background task host that tracks registrations in memory.
#[derive(Debug, Default)]
pub struct SimulatedTaskHost {
    registered: Mutex<HashMap<String, TrackingOptions>>,
    fail_register: Mutex<Option<PlatformError>>,
    register_calls: AtomicUsize,
}

impl SimulatedTaskHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `register` call fails with `error`.
    pub fn fail_next_register(&self, error: PlatformError) {
        *lock(&self.fail_register) = Some(error);
    }

    /// Drop a registration without going through `unregister`, as the OS
    /// does when it kills a background task.
    pub fn kill(&self, task_name: &str) {
        lock(&self.registered).remove(task_name);
    }

    pub fn options_for(&self, task_name: &str) -> Option<TrackingOptions> {
        lock(&self.registered).get(task_name).cloned()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BackgroundTaskHost for SimulatedTaskHost {
    async fn register(&self, task_name: &str, options: &TrackingOptions) -> Result<(), PlatformError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.fail_register).take() {
            return Err(err);
        }
        lock(&self.registered).insert(task_name.to_string(), options.clone());
        Ok(())
    }

    async fn unregister(&self, task_name: &str) -> Result<(), PlatformError> {
        lock(&self.registered).remove(task_name);
        Ok(())
    }

    async fn is_registered(&self, task_name: &str) -> bool {
        lock(&self.registered).contains_key(task_name)
    }
}

/// Points every `step_meters` along the great circle from `start` to `end`,
/// ending exactly at `end`.
pub fn route_towards(start: Coordinate, end: Coordinate, step_meters: f64) -> Vec<Coordinate> {
    let total = geo_math::distance(start, end);
    if total == 0.0 || step_meters <= 0.0 {
        return vec![end];
    }

    let mut points = Vec::new();
    let mut travelled = 0.0;
    let mut current = start;
    while travelled + step_meters < total {
        let heading = geo_math::bearing(current, end);
        current = geo_math::destination_point(current, heading, step_meters);
        travelled += step_meters;
        points.push(current);
    }
    points.push(end);
    points
}
