//! Alarm domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{geo_math, Coordinate};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::Destination;

/// Smallest allowed trigger radius, in meters.
pub const MIN_TRIGGER_RADIUS_METERS: f64 = 50.0;

/// Largest allowed trigger radius, in meters.
pub const MAX_TRIGGER_RADIUS_METERS: f64 = 2000.0;

/// Two destinations closer than this are treated as the same monitoring target.
pub const DUPLICATE_LOCATION_THRESHOLD_METERS: f64 = 50.0;

fn validate_trigger_radius(radius: f64) -> Result<(), ValidationError> {
    if (MIN_TRIGGER_RADIUS_METERS..=MAX_TRIGGER_RADIUS_METERS).contains(&radius) {
        Ok(())
    } else {
        let mut err = ValidationError::new("trigger_radius_range");
        err.message = Some("Trigger radius must be between 50 and 2000 meters".into());
        Err(err)
    }
}

/// Per-alarm user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSettings {
    #[validate(custom(function = "validate_trigger_radius"))]
    pub trigger_radius: f64,
    pub vibration_enabled: bool,
    pub persistent_notification: bool,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            trigger_radius: 500.0,
            vibration_enabled: true,
            persistent_notification: true,
        }
    }
}

impl AlarmSettings {
    /// Returns a copy of these settings with the update's present fields applied.
    pub fn merged(&self, update: &AlarmSettingsUpdate) -> Self {
        Self {
            trigger_radius: update.trigger_radius.unwrap_or(self.trigger_radius),
            vibration_enabled: update.vibration_enabled.unwrap_or(self.vibration_enabled),
            persistent_notification: update
                .persistent_notification
                .unwrap_or(self.persistent_notification),
        }
    }
}

/// Partial settings update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSettingsUpdate {
    #[validate(custom(function = "validate_trigger_radius"))]
    pub trigger_radius: Option<f64>,
    pub vibration_enabled: Option<bool>,
    pub persistent_notification: Option<bool>,
}

impl AlarmSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.trigger_radius.is_none()
            && self.vibration_enabled.is_none()
            && self.persistent_notification.is_none()
    }
}

/// An armed proximity alarm for one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub destination: Destination,
    pub settings: AlarmSettings,
    /// Region id of the geofence armed for this alarm, if any.
    pub geofence_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Alarm {
    /// Creates a new active alarm with a fresh id.
    pub fn new(destination: Destination, settings: AlarmSettings) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            destination,
            settings,
            geofence_id: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        self.destination.coordinate
    }

    /// Distance in meters from `position` to this alarm's destination.
    pub fn distance_from(&self, position: Coordinate) -> f64 {
        geo_math::distance(position, self.destination.coordinate)
    }

    /// Whether `position` lies inside this alarm's trigger radius.
    pub fn is_within_trigger_radius(&self, position: Coordinate) -> bool {
        self.distance_from(position) <= self.settings.trigger_radius
    }
}

/// Outcome of a create request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlarmResult {
    pub alarm: Alarm,
    /// True when an alarm near the requested destination already existed
    /// and was returned instead of creating a duplicate.
    pub is_existing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An alarm together with the current distance to its destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDistance {
    pub alarm: Alarm,
    pub distance_meters: f64,
}

/// Which detection path fired an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Geofence,
    Polling,
    BackgroundFix,
    Manual,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Geofence => "geofence",
            TriggerSource::Polling => "polling",
            TriggerSource::BackgroundFix => "background_fix",
            TriggerSource::Manual => "manual",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarm() -> Alarm {
        let destination = Destination::new("Connaught Place", Coordinate::new(28.6315, 77.2167), None);
        Alarm::new(destination, AlarmSettings::default())
    }

    #[test]
    fn test_settings_default_is_valid() {
        assert!(AlarmSettings::default().validate().is_ok());
    }

    #[test]
    fn test_settings_radius_bounds() {
        let mut s = AlarmSettings::default();
        for ok in [50.0, 200.0, 2000.0] {
            s.trigger_radius = ok;
            assert!(s.validate().is_ok(), "{ok} should be valid");
        }
        for bad in [49.9, 2000.1, 0.0, -100.0, f64::NAN, f64::INFINITY] {
            s.trigger_radius = bad;
            assert!(s.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_settings_merge_partial() {
        let base = AlarmSettings::default();
        let update = AlarmSettingsUpdate {
            trigger_radius: Some(300.0),
            ..Default::default()
        };
        let merged = base.merged(&update);
        assert_eq!(merged.trigger_radius, 300.0);
        assert_eq!(merged.vibration_enabled, base.vibration_enabled);
        assert_eq!(merged.persistent_notification, base.persistent_notification);
    }

    #[test]
    fn test_settings_update_validation() {
        let update = AlarmSettingsUpdate {
            trigger_radius: Some(10.0),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(AlarmSettingsUpdate::default().validate().is_ok());
        assert!(AlarmSettingsUpdate::default().is_empty());
    }

    #[test]
    fn test_settings_update_deserialization() {
        let json = r#"{"vibrationEnabled": false}"#;
        let update: AlarmSettingsUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.vibration_enabled, Some(false));
        assert!(update.trigger_radius.is_none());
    }

    #[test]
    fn test_new_alarm_is_active_without_geofence() {
        let a = alarm();
        assert!(a.is_active);
        assert!(a.geofence_id.is_none());
    }

    #[test]
    fn test_within_trigger_radius() {
        let a = alarm();
        assert!(a.is_within_trigger_radius(a.coordinate()));
        let far = geo_math::destination_point(a.coordinate(), 0.0, 600.0);
        assert!(!a.is_within_trigger_radius(far));
        let near = geo_math::destination_point(a.coordinate(), 0.0, 400.0);
        assert!(a.is_within_trigger_radius(near));
    }

    #[test]
    fn test_alarm_serialization() {
        let a = alarm();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["isActive"], true);
        assert!(json["geofenceId"].is_null());
        assert_eq!(json["settings"]["triggerRadius"], 500.0);
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_trigger_source_display() {
        assert_eq!(TriggerSource::Geofence.to_string(), "geofence");
        assert_eq!(TriggerSource::BackgroundFix.to_string(), "background_fix");
        let json = serde_json::to_string(&TriggerSource::Polling).unwrap();
        assert_eq!(json, "\"polling\"");
    }
}
