//! Polling fallback for alarms whose geofence could not be armed.
//!
//! Each session is one spawned task asking the location provider for a
//! fix, comparing the distance to the target radius and sleeping for an
//! interval that adapts to how close the device is.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use shared::{geo_math, Coordinate};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PollingConfig;
use crate::providers::{LocationError, LocationProvider};

/// What a poll session watches for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollTarget {
    pub coordinate: Coordinate,
    pub radius: f64,
}

/// Opaque handle of a running poll session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollSessionId(String);

impl PollSessionId {
    fn generate() -> Self {
        Self(format!("poll-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receives the outcome of a poll session. Each session calls at most one
/// of these methods, at most once.
#[async_trait::async_trait]
pub trait PollHandler: Send + Sync {
    /// The device came within the target radius.
    async fn on_trigger(&self, session: &PollSessionId, distance_meters: f64);

    /// Polling cannot continue until the user changes permissions or
    /// re-enables location services.
    async fn on_terminal_error(&self, session: &PollSessionId, error: LocationError);
}

/// Delay before the next check.
///
/// Small radii always use the approach interval. Otherwise the interval
/// shrinks when the device is within `approach_factor` radii and grows
/// beyond `far_factor` radii. With no known distance the base interval
/// is used.
pub fn next_interval(config: &PollingConfig, radius: f64, distance: Option<f64>) -> Duration {
    if radius <= config.small_radius_meters {
        return config.approach_interval();
    }
    match distance {
        Some(d) if d <= radius * config.approach_factor => config.approach_interval(),
        Some(d) if d > radius * config.far_factor => config.far_interval(),
        _ => config.base_interval(),
    }
}

type Sessions = Arc<Mutex<HashMap<PollSessionId, watch::Sender<bool>>>>;

/// Runs poll sessions on the tokio runtime.
pub struct PollAdapter {
    location: Arc<dyn LocationProvider>,
    config: PollingConfig,
    sessions: Sessions,
}

impl fmt::Debug for PollAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PollAdapter {
    pub fn new(location: Arc<dyn LocationProvider>, config: PollingConfig) -> Self {
        Self {
            location,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a session. The first check runs immediately.
    pub async fn start_polling(
        &self,
        target: PollTarget,
        handler: Arc<dyn PollHandler>,
    ) -> PollSessionId {
        let id = PollSessionId::generate();
        let (stop_tx, stop_rx) = watch::channel(false);

        // Registered before the task exists so a stop issued right after
        // start always finds the session.
        let mut sessions = self.sessions.lock().await;
        sessions.insert(id.clone(), stop_tx);

        tokio::spawn(run_session(
            id.clone(),
            target,
            self.location.clone(),
            self.config.clone(),
            handler,
            stop_rx,
            self.sessions.clone(),
        ));

        info!(
            session = %id,
            latitude = target.coordinate.latitude,
            longitude = target.coordinate.longitude,
            radius_m = target.radius,
            active = sessions.len(),
            "Poll session started"
        );
        id
    }

    /// Stop a session. Returns `false` if it already ended.
    ///
    /// Safe to call from inside the session's own handler.
    pub async fn stop_polling(&self, id: &PollSessionId) -> bool {
        let Some(stop_tx) = self.sessions.lock().await.remove(id) else {
            return false;
        };
        // The receiver may already be gone if the task is finishing.
        let _ = stop_tx.send(true);
        debug!(session = %id, "Poll session stopped");
        true
    }

    /// Stop every session. Returns how many were running.
    pub async fn stop_all(&self) -> usize {
        let drained: Vec<_> = self.sessions.lock().await.drain().collect();
        for (_, stop_tx) in &drained {
            let _ = stop_tx.send(true);
        }
        drained.len()
    }

    pub async fn is_active(&self, id: &PollSessionId) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

async fn run_session(
    id: PollSessionId,
    target: PollTarget,
    location: Arc<dyn LocationProvider>,
    config: PollingConfig,
    handler: Arc<dyn PollHandler>,
    mut stop_rx: watch::Receiver<bool>,
    sessions: Sessions,
) {
    loop {
        let fix = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            fix = tokio::time::timeout(config.location_timeout(), location.current_position()) => fix,
        };

        let delay = match fix {
            Ok(Ok(position)) => {
                let distance = geo_math::distance(position, target.coordinate);
                if distance <= target.radius {
                    if !*stop_rx.borrow() {
                        info!(session = %id, distance_m = distance, "Poll session reached target");
                        handler.on_trigger(&id, distance).await;
                    }
                    break;
                }
                let delay = next_interval(&config, target.radius, Some(distance));
                debug!(
                    session = %id,
                    distance_m = distance,
                    next_check_secs = delay.as_secs(),
                    "Poll check outside radius"
                );
                delay
            }
            Ok(Err(e)) if e.is_terminal() => {
                warn!(session = %id, error = %e, "Poll session ended by location error");
                if !*stop_rx.borrow() {
                    handler.on_terminal_error(&id, e).await;
                }
                break;
            }
            Ok(Err(e)) => {
                warn!(session = %id, error = %e, "Poll check failed, retrying");
                config.base_interval()
            }
            Err(_) => {
                warn!(
                    session = %id,
                    timeout_secs = config.location_timeout().as_secs(),
                    "Poll check timed out, retrying"
                );
                config.base_interval()
            }
        };

        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    sessions.lock().await.remove(&id);
}
