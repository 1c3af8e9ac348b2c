//! Alarm lifecycle manager.
//!
//! Owns the active-alarm set and its persisted mirror. Every mutation,
//! including the evaluate-trigger-persist sequence run for a location fix,
//! a geofence enter or a poll hit, happens under one async mutex, so
//! events from the three detection paths never interleave. Triggering is
//! a check-and-remove on the active set: whichever path gets there first
//! fires, later ones find the alarm gone and do nothing.
//!
//! Platform glue feeds events in through [`AlarmManager::geofence`]
//! (`handle_region_enter`) and [`AlarmManager::tracker`] (`on_fix`).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use domain::models::{
    Alarm, AlarmDistance, AlarmSettings, AlarmSettingsUpdate, CreateAlarmResult, Destination,
    MonitoringMode, MonitoringStatus, RegionEnterEvent, TriggerSource,
};
use domain::services::AlarmNotifier;
use domain::AlarmError;
use metrics::counter;
use persistence::repositories::{AlarmRepository, RegionRepository};
use persistence::KeyValueStore;
use serde::Serialize;
use shared::{geo_math, Coordinate};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::config::Config;
use crate::geofence::{GeofenceAdapter, RegionEventHandler};
use crate::polling::{PollAdapter, PollHandler, PollSessionId, PollTarget};
use crate::providers::{BackgroundTaskHost, LocationError, LocationProvider, RegionMonitor};
use crate::tracking::{BackgroundTracker, LocationFixHandler};

/// Platform collaborators the manager is composed from.
#[derive(Clone)]
pub struct Platform {
    pub location: Arc<dyn LocationProvider>,
    pub regions: Arc<dyn RegionMonitor>,
    pub tasks: Arc<dyn BackgroundTaskHost>,
    pub store: Arc<dyn KeyValueStore>,
    pub notifier: Arc<dyn AlarmNotifier>,
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    /// Alarms fired by this cycle.
    pub triggered: Vec<String>,
    /// Surviving alarms with their current distance.
    pub remaining: Vec<AlarmDistance>,
}

#[derive(Debug, Default)]
struct ManagerState {
    initialized: bool,
    alarms: Vec<Alarm>,
    /// Alarm id -> fallback poll session.
    poll_sessions: HashMap<String, PollSessionId>,
    /// The last snapshot write failed; retried before the next operation.
    persist_pending: bool,
}

pub struct AlarmManager {
    self_ref: Weak<AlarmManager>,
    repository: AlarmRepository,
    geofence: Arc<GeofenceAdapter>,
    polling: Arc<PollAdapter>,
    tracker: Arc<BackgroundTracker>,
    notifier: Arc<dyn AlarmNotifier>,
    duplicate_threshold: f64,
    state: Mutex<ManagerState>,
}

impl std::fmt::Debug for AlarmManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmManager")
            .field("duplicate_threshold", &self.duplicate_threshold)
            .finish_non_exhaustive()
    }
}

impl AlarmManager {
    pub fn new(config: &Config, platform: Platform) -> Arc<Self> {
        let geofence = Arc::new(GeofenceAdapter::new(
            platform.regions,
            platform.location.clone(),
            RegionRepository::new(platform.store.clone()),
            config.geofence.max_regions,
        ));
        let polling = Arc::new(PollAdapter::new(
            platform.location.clone(),
            config.polling.clone(),
        ));
        let tracker = Arc::new(BackgroundTracker::new(
            platform.tasks,
            platform.location,
            &config.tracking,
        ));

        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            repository: AlarmRepository::new(platform.store),
            geofence,
            polling,
            tracker,
            notifier: platform.notifier,
            duplicate_threshold: config.alarms.duplicate_threshold_meters,
            state: Mutex::new(ManagerState::default()),
        })
    }

    pub fn geofence(&self) -> &Arc<GeofenceAdapter> {
        &self.geofence
    }

    pub fn tracker(&self) -> &Arc<BackgroundTracker> {
        &self.tracker
    }

    pub fn polling(&self) -> &Arc<PollAdapter> {
        &self.polling
    }

    /// Restore the active set and install event handlers.
    ///
    /// Must complete before any other operation. A corrupt alarm snapshot
    /// is discarded and the manager starts empty. Restored alarms are
    /// reconciled against the restored geofence set, and background
    /// tracking restarts if any alarm survived. Returns the restored count.
    pub async fn initialize(&self) -> Result<usize, AlarmError> {
        let restored = {
            let mut state = self.state.lock().await;
            if state.initialized {
                return Ok(state.alarms.len());
            }

            let alarms = match self.repository.load().await {
                Ok(alarms) => alarms,
                Err(e) if e.is_corrupt() => {
                    warn!(error = %e, "Discarding corrupt alarm snapshot");
                    if let Err(clear_err) = self.repository.clear().await {
                        warn!(error = %clear_err, "Failed to clear corrupt alarm snapshot");
                    }
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            self.geofence.initialize().await?;

            state.alarms = alarms;
            state.initialized = true;

            self.install_region_handler().await;
            self.tracker
                .register_handler(Arc::new(FixHandler {
                    manager: self.self_ref.clone(),
                }))
                .await;

            self.reconcile_locked(&mut state).await;
            state.alarms.len()
        };

        if restored > 0 {
            self.ensure_tracking().await;
        }
        info!(alarms = restored, "Alarm manager initialized");
        Ok(restored)
    }

    /// Detach handlers and stop every monitoring primitive owned by this
    /// process. Persisted alarms and armed regions are left in place for
    /// the next `initialize`.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return;
        }
        self.flush_pending_locked(&mut state).await;

        self.geofence.clear_event_handler().await;
        self.tracker.clear_handler().await;
        let sessions = self.polling.stop_all().await;
        if let Err(e) = self.tracker.stop().await {
            warn!(error = %e, "Failed to stop background tracking on shutdown");
        }

        state.poll_sessions.clear();
        state.alarms.clear();
        state.initialized = false;
        info!(poll_sessions = sessions, "Alarm manager shut down");
    }

    /// Create an alarm, or return the existing one if an active alarm's
    /// destination lies within the duplicate threshold.
    ///
    /// A failure to arm a geofence is not an error: the alarm falls back
    /// to polling.
    pub async fn create_alarm(
        &self,
        destination: Destination,
        settings: AlarmSettings,
    ) -> Result<CreateAlarmResult, AlarmError> {
        destination.validate()?;

        let result = {
            let mut state = self.lock_ready().await?;

            if let Some(existing) =
                nearest_within(&state.alarms, destination.coordinate, self.duplicate_threshold)
            {
                counter!("alarms_merged_total").increment(1);
                info!(
                    alarm_id = %existing.id,
                    destination = %existing.destination.name,
                    requested = %destination.name,
                    "Alarm already exists near destination"
                );
                return Ok(CreateAlarmResult {
                    alarm: existing.clone(),
                    is_existing: true,
                    message: Some(format!(
                        "An alarm for {} already exists near this location",
                        existing.destination.name
                    )),
                });
            }

            settings.validate()?;

            let alarm = Alarm::new(destination, settings);
            let mut next = state.alarms.clone();
            next.push(alarm.clone());
            self.repository.save(&next).await?;
            state.alarms = next;

            if self.setup_monitoring_locked(&mut state, &alarm.id).await {
                self.persist_or_defer_locked(&mut state).await;
            }

            let alarm = find(&state.alarms, &alarm.id).cloned().unwrap_or(alarm);
            counter!("alarms_created_total").increment(1);
            info!(
                alarm_id = %alarm.id,
                destination = %alarm.destination.name,
                radius_m = alarm.settings.trigger_radius,
                geofenced = alarm.geofence_id.is_some(),
                "Alarm created"
            );

            CreateAlarmResult {
                alarm,
                is_existing: false,
                message: None,
            }
        };

        self.ensure_tracking().await;
        Ok(result)
    }

    /// Cancel one alarm. Returns `false` if it was not active, e.g.
    /// because it already fired.
    pub async fn cancel_alarm(&self, alarm_id: &str) -> Result<bool, AlarmError> {
        let mut state = self.lock_ready().await?;
        let cancelled = self.cancel_locked(&mut state, alarm_id).await?;
        if cancelled && state.alarms.is_empty() {
            self.stop_tracking_locked(true).await;
        }
        Ok(cancelled)
    }

    /// Cancel every active alarm and stop background tracking. Returns
    /// how many alarms were cancelled.
    pub async fn cancel_all_alarms(&self) -> Result<usize, AlarmError> {
        let mut state = self.lock_ready().await?;
        let ids: Vec<String> = state.alarms.iter().map(|a| a.id.clone()).collect();

        let mut cancelled = 0;
        for id in ids {
            if self.cancel_locked(&mut state, &id).await? {
                cancelled += 1;
            }
        }

        self.stop_tracking_locked(true).await;
        info!(cancelled, "All alarms cancelled");
        Ok(cancelled)
    }

    /// Fire an alarm. Returns `false` if it was no longer active.
    pub async fn trigger_alarm(
        &self,
        alarm_id: &str,
        source: TriggerSource,
    ) -> Result<bool, AlarmError> {
        let mut state = self.lock_ready().await?;
        Ok(self.trigger_locked(&mut state, alarm_id, source).await)
    }

    /// Merge and validate new settings. Monitoring is not re-armed: an
    /// armed geofence or poll session keeps the previous radius, while
    /// background evaluation uses the new one from the next fix.
    pub async fn update_alarm_settings(
        &self,
        alarm_id: &str,
        update: AlarmSettingsUpdate,
    ) -> Result<Alarm, AlarmError> {
        let mut state = self.lock_ready().await?;
        let index = position(&state.alarms, alarm_id)
            .ok_or_else(|| AlarmError::NotFound(format!("alarm {alarm_id}")))?;

        update.validate()?;
        let current = &state.alarms[index];
        let merged = current.settings.merged(&update);
        merged.validate()?;

        let radius_changed = merged.trigger_radius != current.settings.trigger_radius;
        let mut next = state.alarms.clone();
        next[index].settings = merged;
        self.repository.save(&next).await?;
        state.alarms = next;

        let updated = state.alarms[index].clone();
        if radius_changed
            && (updated.geofence_id.is_some() || state.poll_sessions.contains_key(alarm_id))
        {
            warn!(
                alarm_id = %alarm_id,
                radius_m = updated.settings.trigger_radius,
                "Trigger radius changed; armed monitoring keeps the previous radius"
            );
        }
        info!(alarm_id = %alarm_id, "Alarm settings updated");
        Ok(updated)
    }

    /// Run one evaluation cycle against `position`: fire every alarm whose
    /// trigger radius contains it, then refresh the ongoing display for
    /// the rest.
    pub async fn check_location(&self, position: Coordinate) -> Result<EvaluationSummary, AlarmError> {
        if !geo_math::is_valid_coordinate(position) {
            return Err(AlarmError::InvalidInput(format!(
                "invalid coordinate {position}"
            )));
        }

        let mut state = self.lock_ready().await?;
        let due: Vec<String> = state
            .alarms
            .iter()
            .filter(|a| a.is_within_trigger_radius(position))
            .map(|a| a.id.clone())
            .collect();

        let mut triggered = Vec::new();
        for id in due {
            if self
                .trigger_locked(&mut state, &id, TriggerSource::BackgroundFix)
                .await
            {
                triggered.push(id);
            }
        }

        let remaining: Vec<AlarmDistance> = state
            .alarms
            .iter()
            .map(|alarm| AlarmDistance {
                distance_meters: alarm.distance_from(position),
                alarm: alarm.clone(),
            })
            .collect();

        if !remaining.is_empty() {
            if let Err(e) = self.notifier.show_ongoing(&remaining).await {
                warn!(error = %e, "Failed to update ongoing notification");
            }
        } else if triggered.is_empty() {
            // Whatever emptied the set already reset the display.
            self.stop_tracking_locked(false).await;
        }

        debug!(
            %position,
            triggered = triggered.len(),
            remaining = remaining.len(),
            "Evaluated location fix"
        );
        Ok(EvaluationSummary {
            triggered,
            remaining,
        })
    }

    pub async fn get_active_alarms(&self) -> Vec<Alarm> {
        self.state.lock().await.alarms.clone()
    }

    pub async fn get_alarm(&self, alarm_id: &str) -> Option<Alarm> {
        find(&self.state.lock().await.alarms, alarm_id).cloned()
    }

    /// Whether an active alarm's destination lies within `radius` meters
    /// (default: the duplicate threshold) of `coordinate`.
    pub async fn has_alarm_near(&self, coordinate: Coordinate, radius: Option<f64>) -> bool {
        self.find_alarm_near(coordinate, radius).await.is_some()
    }

    /// The closest active alarm within `radius` meters of `coordinate`.
    pub async fn find_alarm_near(&self, coordinate: Coordinate, radius: Option<f64>) -> Option<Alarm> {
        let threshold = radius.unwrap_or(self.duplicate_threshold);
        nearest_within(&self.state.lock().await.alarms, coordinate, threshold).cloned()
    }

    /// Which mechanisms currently watch `alarm_id`.
    pub async fn monitoring_mode(&self, alarm_id: &str) -> Option<MonitoringMode> {
        let state = self.state.lock().await;
        find(&state.alarms, alarm_id).map(|alarm| {
            MonitoringMode::from_flags(
                alarm.geofence_id.is_some(),
                state.poll_sessions.contains_key(alarm_id),
            )
        })
    }

    pub async fn get_monitoring_status(&self) -> MonitoringStatus {
        let state = self.state.lock().await;
        let mut status = MonitoringStatus {
            total_alarms: state.alarms.len(),
            armed_regions: self.geofence.armed_count().await,
            background_tracking: self.tracker.is_running().await,
            ..MonitoringStatus::default()
        };

        for alarm in &state.alarms {
            let polling = state.poll_sessions.contains_key(&alarm.id);
            match MonitoringMode::from_flags(alarm.geofence_id.is_some(), polling) {
                MonitoringMode::Geofence => status.geofenced += 1,
                MonitoringMode::Polling => status.polling += 1,
                MonitoringMode::GeofenceAndPolling => {
                    status.geofenced += 1;
                    status.polling += 1;
                }
                MonitoringMode::Unmonitored => status.unmonitored += 1,
            }
        }
        status
    }

    async fn lock_ready(&self) -> Result<MutexGuard<'_, ManagerState>, AlarmError> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(AlarmError::NotInitialized);
        }
        self.flush_pending_locked(&mut state).await;
        Ok(state)
    }

    async fn flush_pending_locked(&self, state: &mut ManagerState) {
        if !state.persist_pending {
            return;
        }
        match self.repository.save(&state.alarms).await {
            Ok(()) => {
                state.persist_pending = false;
                info!(alarms = state.alarms.len(), "Deferred alarm snapshot written");
            }
            Err(e) => warn!(error = %e, "Deferred alarm snapshot still failing"),
        }
    }

    async fn persist_or_defer_locked(&self, state: &mut ManagerState) {
        match self.repository.save(&state.alarms).await {
            Ok(()) => state.persist_pending = false,
            Err(e) => {
                error!(error = %e, "Failed to persist alarm snapshot, will retry");
                state.persist_pending = true;
            }
        }
    }

    /// Arm a geofence for the alarm, falling back to polling. Returns
    /// whether the alarm record changed and needs persisting.
    async fn setup_monitoring_locked(&self, state: &mut ManagerState, alarm_id: &str) -> bool {
        let Some(index) = position(&state.alarms, alarm_id) else {
            return false;
        };
        let coordinate = state.alarms[index].coordinate();
        let radius = state.alarms[index].settings.trigger_radius;

        let region_id = format!("alarm-{alarm_id}");
        match self.geofence.arm(coordinate, radius, Some(&region_id)).await {
            Ok(region_id) => {
                info!(alarm_id = %alarm_id, region_id = %region_id, "Alarm monitored by geofence");
                state.alarms[index].geofence_id = Some(region_id);
                true
            }
            Err(e) => {
                warn!(alarm_id = %alarm_id, error = %e, "Geofence unavailable, falling back to polling");
                counter!("monitoring_fallback_total").increment(1);

                if let Some(previous) = state.poll_sessions.remove(alarm_id) {
                    self.polling.stop_polling(&previous).await;
                }
                let handler = Arc::new(PollTriggerHandler {
                    manager: self.self_ref.clone(),
                    alarm_id: alarm_id.to_string(),
                });
                let session = self
                    .polling
                    .start_polling(PollTarget { coordinate, radius }, handler)
                    .await;
                info!(alarm_id = %alarm_id, session = %session, "Alarm monitored by polling");
                state.poll_sessions.insert(alarm_id.to_string(), session);
                false
            }
        }
    }

    /// Bring restored alarms and restored regions back in line.
    async fn reconcile_locked(&self, state: &mut ManagerState) {
        let armed: HashSet<String> = self
            .geofence
            .armed_regions()
            .await
            .into_iter()
            .map(|r| r.identifier)
            .collect();

        let mut changed = false;
        let ids: Vec<String> = state.alarms.iter().map(|a| a.id.clone()).collect();
        for id in &ids {
            let Some(index) = position(&state.alarms, id) else {
                continue;
            };
            let needs_setup = match &state.alarms[index].geofence_id {
                Some(region_id) if armed.contains(region_id) => false,
                Some(region_id) => {
                    warn!(alarm_id = %id, region_id = %region_id, "Restored alarm lost its geofence");
                    state.alarms[index].geofence_id = None;
                    changed = true;
                    true
                }
                None => true,
            };
            if needs_setup {
                changed |= self.setup_monitoring_locked(state, id).await;
            }
        }

        let referenced: HashSet<&str> = state
            .alarms
            .iter()
            .filter_map(|a| a.geofence_id.as_deref())
            .collect();
        for region_id in armed.iter().filter(|r| !referenced.contains(r.as_str())) {
            info!(region_id = %region_id, "Disarming geofence with no active alarm");
            self.geofence.disarm(region_id).await;
        }

        if changed {
            self.persist_or_defer_locked(state).await;
        }
    }

    async fn cancel_locked(&self, state: &mut ManagerState, alarm_id: &str) -> Result<bool, AlarmError> {
        let Some(index) = position(&state.alarms, alarm_id) else {
            debug!(alarm_id = %alarm_id, "Cancel of inactive alarm ignored");
            return Ok(false);
        };

        let mut next = state.alarms.clone();
        let alarm = next.remove(index);
        self.repository.save(&next).await?;
        state.alarms = next;

        self.teardown_locked(state, &alarm).await;
        self.install_region_handler().await;

        counter!("alarms_cancelled_total").increment(1);
        info!(alarm_id = %alarm.id, destination = %alarm.destination.name, "Alarm cancelled");
        Ok(true)
    }

    /// The single firing path. Notification failures and panics are logged; teardown,
    /// removal and persistence always happen.
    async fn trigger_locked(
        &self,
        state: &mut ManagerState,
        alarm_id: &str,
        source: TriggerSource,
    ) -> bool {
        let Some(alarm) = find(&state.alarms, alarm_id).cloned() else {
            debug!(alarm_id = %alarm_id, source = %source, "Trigger for inactive alarm ignored");
            return false;
        };

        if state.alarms.len() == 1 {
            // Status display goes before the arrival alert so the alert stays on screen.
            if let Err(e) = self.notifier.clear_ongoing().await {
                warn!(error = %e, "Failed to remove ongoing notification");
            }
        }

        let notifier = self.notifier.clone();
        let shown = {
            let alarm = alarm.clone();
            tokio::spawn(async move { notifier.show_triggered(&alarm).await }).await
        };
        match shown {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(alarm_id = %alarm_id, error = %e, "Failed to show arrival alert"),
            Err(e) => error!(alarm_id = %alarm_id, error = %e, "Arrival alert dispatcher panicked"),
        }

        self.teardown_locked(state, &alarm).await;
        state.alarms.retain(|a| a.id != alarm_id);
        self.persist_or_defer_locked(state).await;

        counter!("alarms_triggered_total", "source" => source.as_str()).increment(1);
        info!(
            alarm_id = %alarm_id,
            destination = %alarm.destination.name,
            source = %source,
            "Alarm triggered"
        );

        if state.alarms.is_empty() {
            self.stop_tracking_locked(false).await;
        }
        true
    }

    async fn teardown_locked(&self, state: &mut ManagerState, alarm: &Alarm) {
        if let Some(region_id) = &alarm.geofence_id {
            self.geofence.disarm(region_id).await;
        }
        if let Some(session) = state.poll_sessions.remove(&alarm.id) {
            self.polling.stop_polling(&session).await;
        }
    }

    async fn handle_region_event(&self, event: RegionEnterEvent) -> Result<(), AlarmError> {
        let mut state = self.lock_ready().await?;
        let owner = state
            .alarms
            .iter()
            .find(|a| a.geofence_id.as_deref() == Some(event.region_id.as_str()))
            .map(|a| a.id.clone());

        match owner {
            Some(alarm_id) => {
                self.trigger_locked(&mut state, &alarm_id, TriggerSource::Geofence)
                    .await;
            }
            None => debug!(region_id = %event.region_id, "Geofence event matches no active alarm"),
        }
        Ok(())
    }

    async fn handle_poll_failure(&self, alarm_id: &str, session: &PollSessionId, err: LocationError) {
        let Ok(mut state) = self.lock_ready().await else {
            return;
        };
        if state.poll_sessions.get(alarm_id) == Some(session) {
            state.poll_sessions.remove(alarm_id);
            error!(
                alarm_id = %alarm_id,
                error = %err,
                "Polling stopped; alarm relies on background tracking until location access returns"
            );
        }
    }

    async fn install_region_handler(&self) {
        self.geofence
            .set_event_handler(Arc::new(GeofenceEventHandler {
                manager: self.self_ref.clone(),
            }))
            .await;
    }

    async fn ensure_tracking(&self) {
        if let Err(e) = self.tracker.start().await {
            warn!(error = %e, "Background tracking unavailable");
        }
    }

    /// Stop the background task. `clear_alerts` also removes arrival
    /// alerts; the ongoing display is reset by the caller that emptied the set.
    async fn stop_tracking_locked(&self, clear_alerts: bool) {
        if let Err(e) = self.tracker.stop().await {
            warn!(error = %e, "Failed to stop background tracking");
        }
        if clear_alerts {
            if let Err(e) = self.notifier.clear_all().await {
                warn!(error = %e, "Failed to clear alarm notifications");
            }
        }
    }
}

fn position(alarms: &[Alarm], alarm_id: &str) -> Option<usize> {
    alarms.iter().position(|a| a.id == alarm_id)
}

fn find<'a>(alarms: &'a [Alarm], alarm_id: &str) -> Option<&'a Alarm> {
    alarms.iter().find(|a| a.id == alarm_id)
}

fn nearest_within(alarms: &[Alarm], coordinate: Coordinate, threshold: f64) -> Option<&Alarm> {
    alarms
        .iter()
        .map(|a| (a, a.distance_from(coordinate)))
        .filter(|(_, d)| *d <= threshold)
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(alarm, _)| alarm)
}

struct GeofenceEventHandler {
    manager: Weak<AlarmManager>,
}

#[async_trait::async_trait]
impl RegionEventHandler for GeofenceEventHandler {
    async fn on_region_enter(&self, event: RegionEnterEvent) -> Result<(), AlarmError> {
        match self.manager.upgrade() {
            Some(manager) => manager.handle_region_event(event).await,
            None => Ok(()),
        }
    }
}

struct PollTriggerHandler {
    manager: Weak<AlarmManager>,
    alarm_id: String,
}

#[async_trait::async_trait]
impl PollHandler for PollTriggerHandler {
    async fn on_trigger(&self, _session: &PollSessionId, distance_meters: f64) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        debug!(alarm_id = %self.alarm_id, distance_m = distance_meters, "Poll reached alarm");
        if let Err(e) = manager
            .trigger_alarm(&self.alarm_id, TriggerSource::Polling)
            .await
        {
            error!(alarm_id = %self.alarm_id, error = %e, "Poll trigger failed");
        }
    }

    async fn on_terminal_error(&self, session: &PollSessionId, error: LocationError) {
        if let Some(manager) = self.manager.upgrade() {
            manager
                .handle_poll_failure(&self.alarm_id, session, error)
                .await;
        }
    }
}

struct FixHandler {
    manager: Weak<AlarmManager>,
}

#[async_trait::async_trait]
impl LocationFixHandler for FixHandler {
    async fn on_location_fix(&self, position: Coordinate) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        if let Err(e) = manager.check_location(position).await {
            warn!(%position, error = %e, "Location fix evaluation failed");
        }
    }
}
