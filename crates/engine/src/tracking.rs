//! Background location task.
//!
//! Keeps a platform-scheduled location task registered while alarms are
//! active and forwards every fix to the registered [`LocationFixHandler`].
//! Fixes are evaluated one at a time.

use std::sync::Arc;
use std::time::Duration;

use domain::AlarmError;
use shared::{geo_math, Coordinate};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::TrackingConfig;
use crate::providers::{BackgroundTaskHost, LocationProvider, TrackingOptions};

/// Upper bound on the fresh-fix request made by `start` when the platform
/// has no cached position.
const STARTUP_FIX_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives location fixes from the background task.
#[async_trait::async_trait]
pub trait LocationFixHandler: Send + Sync {
    async fn on_location_fix(&self, position: Coordinate);
}

pub struct BackgroundTracker {
    host: Arc<dyn BackgroundTaskHost>,
    location: Arc<dyn LocationProvider>,
    task_name: String,
    options: TrackingOptions,
    handler: RwLock<Option<Arc<dyn LocationFixHandler>>>,
    eval_lock: Mutex<()>,
}

impl std::fmt::Debug for BackgroundTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTracker")
            .field("task_name", &self.task_name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BackgroundTracker {
    pub fn new(
        host: Arc<dyn BackgroundTaskHost>,
        location: Arc<dyn LocationProvider>,
        config: &TrackingConfig,
    ) -> Self {
        Self {
            host,
            location,
            task_name: config.task_name.clone(),
            options: TrackingOptions::from(config),
            handler: RwLock::new(None),
            eval_lock: Mutex::new(()),
        }
    }

    /// Install the per-fix handler. Must happen during startup, before the
    /// platform can deliver a fix.
    pub async fn register_handler(&self, handler: Arc<dyn LocationFixHandler>) {
        *self.handler.write().await = Some(handler);
    }

    pub async fn clear_handler(&self) {
        *self.handler.write().await = None;
    }

    /// Register the background task and run one evaluation with the best
    /// known position. No-op if the task is already registered.
    pub async fn start(&self) -> Result<(), AlarmError> {
        if self.host.is_registered(&self.task_name).await {
            debug!(task = %self.task_name, "Background tracking already running");
            return Ok(());
        }

        let permissions = self.location.permissions().await;
        if !permissions.services_enabled {
            return Err(AlarmError::ServicesUnavailable(
                "location services are disabled".to_string(),
            ));
        }
        if !permissions.background {
            return Err(AlarmError::PermissionDenied(
                "background location permission is required for tracking".to_string(),
            ));
        }

        self.host.register(&self.task_name, &self.options).await?;
        info!(
            task = %self.task_name,
            min_interval_secs = self.options.min_interval.as_secs(),
            min_displacement_m = self.options.min_displacement_meters,
            "Background tracking started"
        );

        match self.best_known_position().await {
            Some(position) => self.on_fix(position).await,
            None => debug!(task = %self.task_name, "No position for startup evaluation"),
        }
        Ok(())
    }

    /// Unregister the background task.
    pub async fn stop(&self) -> Result<(), AlarmError> {
        if !self.host.is_registered(&self.task_name).await {
            return Ok(());
        }
        self.host.unregister(&self.task_name).await?;
        info!(task = %self.task_name, "Background tracking stopped");
        Ok(())
    }

    /// Asks the platform, which may have killed the task on its own.
    pub async fn is_running(&self) -> bool {
        self.host.is_registered(&self.task_name).await
    }

    /// Entry point for each fix delivered by the platform.
    pub async fn on_fix(&self, position: Coordinate) {
        if !geo_math::is_valid_coordinate(position) {
            warn!(%position, "Ignoring invalid location fix");
            return;
        }

        let _guard = self.eval_lock.lock().await;
        let handler = self.handler.read().await.clone();
        match handler {
            Some(handler) => handler.on_location_fix(position).await,
            None => warn!(%position, "Location fix with no handler registered"),
        }
    }

    async fn best_known_position(&self) -> Option<Coordinate> {
        if let Some(position) = self.location.last_known_position().await {
            return Some(position);
        }
        match tokio::time::timeout(STARTUP_FIX_TIMEOUT, self.location.current_position()).await {
            Ok(Ok(position)) => Some(position),
            Ok(Err(e)) => {
                debug!(error = %e, "Startup fix unavailable");
                None
            }
            Err(_) => {
                debug!("Startup fix timed out");
                None
            }
        }
    }
}
