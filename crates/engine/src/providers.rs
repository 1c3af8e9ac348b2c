//! Platform collaborator interfaces.
//!
//! Location fixes, region monitoring and background task scheduling are
//! owned by the mobile OS. The engine reaches them only through these
//! traits; platform glue implements them and feeds events back through
//! the adapters' `handle_*`/`on_*` entry points.

use std::time::Duration;

use domain::models::GeofenceRegion;
use domain::AlarmError;
use shared::Coordinate;
use thiserror::Error;

use crate::config::TrackingConfig;

/// Errors from a position request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location services are disabled")]
    ServicesDisabled,

    #[error("Timed out waiting for a location fix")]
    Timeout,

    #[error("Location fix too inaccurate")]
    LowAccuracy,

    #[error("Location temporarily unavailable: {0}")]
    Unavailable(String),
}

impl LocationError {
    /// Terminal errors will not resolve by retrying; the user has to act.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LocationError::PermissionDenied | LocationError::ServicesDisabled
        )
    }
}

impl From<LocationError> for AlarmError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => AlarmError::PermissionDenied(err.to_string()),
            LocationError::ServicesDisabled | LocationError::Unavailable(_) => {
                AlarmError::ServicesUnavailable(err.to_string())
            }
            LocationError::Timeout => AlarmError::Timeout(err.to_string()),
            LocationError::LowAccuracy => AlarmError::Unknown(err.to_string()),
        }
    }
}

/// Errors from region-monitoring and task-scheduling primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Platform error: {0}")]
    Other(String),
}

impl From<PlatformError> for AlarmError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::PermissionDenied(msg) => AlarmError::PermissionDenied(msg),
            PlatformError::Unavailable(msg) => AlarmError::ServicesUnavailable(msg),
            PlatformError::Other(msg) => AlarmError::Unknown(msg),
        }
    }
}

/// Granted location permissions and service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub foreground: bool,
    pub background: bool,
    pub services_enabled: bool,
}

impl PermissionStatus {
    pub const fn all_granted() -> Self {
        Self {
            foreground: true,
            background: true,
            services_enabled: true,
        }
    }

    pub const fn foreground_only() -> Self {
        Self {
            foreground: true,
            background: false,
            services_enabled: true,
        }
    }
}

/// Source of device positions.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Request a fresh fix.
    async fn current_position(&self) -> Result<Coordinate, LocationError>;

    /// Cached last fix, if the platform has one. Never waits for a new fix.
    async fn last_known_position(&self) -> Option<Coordinate>;

    async fn permissions(&self) -> PermissionStatus;
}

/// OS circular-region monitoring.
#[async_trait::async_trait]
pub trait RegionMonitor: Send + Sync {
    /// Whether region monitoring can be used right now.
    async fn is_available(&self) -> bool;

    /// Replace the monitored set with `regions`.
    async fn start_monitoring(&self, regions: &[GeofenceRegion]) -> Result<(), PlatformError>;

    /// Stop monitoring every region.
    async fn stop_monitoring(&self) -> Result<(), PlatformError>;
}

/// Sampling parameters handed to the platform when registering the
/// background location task.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingOptions {
    pub min_interval: Duration,
    pub min_displacement_meters: f64,
    /// Always `false`: alarm tracking must not be paused by the OS.
    pub pauses_automatically: bool,
}

impl From<&TrackingConfig> for TrackingOptions {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            min_interval: config.min_interval(),
            min_displacement_meters: config.min_displacement_meters,
            pauses_automatically: false,
        }
    }
}

/// OS scheduler for long-running background location tasks (a foreground
/// service on Android, significant-location-change on iOS).
#[async_trait::async_trait]
pub trait BackgroundTaskHost: Send + Sync {
    async fn register(&self, task_name: &str, options: &TrackingOptions) -> Result<(), PlatformError>;

    async fn unregister(&self, task_name: &str) -> Result<(), PlatformError>;

    /// Whether the OS currently has the task registered. May turn false
    /// without a call to `unregister` if the OS killed the task.
    async fn is_registered(&self, task_name: &str) -> bool;
}
