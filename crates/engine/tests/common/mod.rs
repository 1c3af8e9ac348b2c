//! Common test utilities for integration tests.
//!
//! Builds an [`AlarmManager`] on the simulated platform. A harness can be
//! "restarted" by building a new one over the same store, which is how
//! process restarts are simulated.

// Allow dead code in this module - these are helper utilities that may not be used
// by all integration tests but are intentionally available for future use.
#![allow(dead_code)]

use std::sync::Arc;

use domain::models::{AlarmSettings, Destination};
use domain::services::MockAlarmNotifier;
use persistence::{InMemoryStore, KeyValueStore};
use shared::{geo_math, Coordinate};
use transit_alarm_engine::simulation::{
    SimulatedLocationProvider, SimulatedRegionMonitor, SimulatedTaskHost,
};
use transit_alarm_engine::{AlarmManager, Config, Platform};

/// New Delhi railway station area.
pub const NEW_DELHI: Coordinate = Coordinate::new(28.6139, 77.2090);

/// Rajiv Chowk metro station.
pub const RAJIV_CHOWK: Coordinate = Coordinate::new(28.6328, 77.2197);

/// Kashmere Gate metro station.
pub const KASHMERE_GATE: Coordinate = Coordinate::new(28.6675, 77.2281);

pub struct TestHarness {
    pub manager: Arc<AlarmManager>,
    pub store: Arc<dyn KeyValueStore>,
    pub location: Arc<SimulatedLocationProvider>,
    pub monitor: Arc<SimulatedRegionMonitor>,
    pub tasks: Arc<SimulatedTaskHost>,
    pub notifier: Arc<MockAlarmNotifier>,
}

impl TestHarness {
    /// A fresh, initialized manager with every permission granted.
    pub async fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new())).await
    }

    /// An initialized manager over an existing store.
    pub async fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let harness = Self::uninitialized(store);
        harness
            .manager
            .initialize()
            .await
            .expect("Failed to initialize alarm manager");
        harness
    }

    /// A manager that has not run `initialize` yet.
    pub fn uninitialized(store: Arc<dyn KeyValueStore>) -> Self {
        let location = Arc::new(SimulatedLocationProvider::new());
        let monitor = Arc::new(SimulatedRegionMonitor::new());
        let tasks = Arc::new(SimulatedTaskHost::new());
        let notifier = Arc::new(MockAlarmNotifier::new());

        let manager = AlarmManager::new(
            &test_config(),
            Platform {
                location: location.clone(),
                regions: monitor.clone(),
                tasks: tasks.clone(),
                store: store.clone(),
                notifier: notifier.clone(),
            },
        );

        Self {
            manager,
            store,
            location,
            monitor,
            tasks,
            notifier,
        }
    }

    /// Simulate a process restart: a new manager and platform over the
    /// same storage.
    pub async fn restart(self) -> Self {
        let store = self.store.clone();
        self.manager.shutdown().await;
        Self::with_store(store).await
    }

    /// Deliver a fix through the platform's background task, the way the
    /// OS would.
    pub async fn deliver_fix(&self, position: Coordinate) {
        self.location.set_position(position);
        self.manager.tracker().on_fix(position).await;
    }

    /// Deliver enter events for every monitored region containing
    /// `position`, the way the OS would.
    pub async fn deliver_region_entries(&self, position: Coordinate) -> usize {
        let entered = self.monitor.regions_containing(position);
        for region_id in &entered {
            self.manager.geofence().handle_region_enter(region_id).await;
        }
        entered.len()
    }
}

pub fn test_config() -> Config {
    Config::default()
}

pub fn destination(name: &str, coordinate: Coordinate) -> Destination {
    Destination::new(name, coordinate, None)
}

pub fn settings(radius: f64) -> AlarmSettings {
    AlarmSettings {
        trigger_radius: radius,
        ..AlarmSettings::default()
    }
}

/// A point `meters` due east of `origin`.
pub fn east_of(origin: Coordinate, meters: f64) -> Coordinate {
    geo_math::destination_point(origin, 90.0, meters)
}
