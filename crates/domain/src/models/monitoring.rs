//! Monitoring diagnostics.

use serde::Serialize;

/// Which detection mechanisms are attached to an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    Geofence,
    Polling,
    GeofenceAndPolling,
    Unmonitored,
}

impl MonitoringMode {
    pub fn from_flags(geofenced: bool, polling: bool) -> Self {
        match (geofenced, polling) {
            (true, true) => MonitoringMode::GeofenceAndPolling,
            (true, false) => MonitoringMode::Geofence,
            (false, true) => MonitoringMode::Polling,
            (false, false) => MonitoringMode::Unmonitored,
        }
    }
}

/// Counts of alarms by monitoring mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub total_alarms: usize,
    /// Alarms with an armed geofence region.
    pub geofenced: usize,
    /// Alarms with an active poll session.
    pub polling: usize,
    /// Alarms with neither; only the background tracker watches these.
    pub unmonitored: usize,
    pub armed_regions: usize,
    pub background_tracking: bool,
}
