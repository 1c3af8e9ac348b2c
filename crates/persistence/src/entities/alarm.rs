//! Alarm entity (stored JSON record).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use shared::Coordinate;

use domain::models::{Alarm, AlarmSettings, Destination};

/// Stored form of a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationEntity {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at: String,
}

/// Stored form of alarm settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSettingsEntity {
    pub trigger_radius: f64,
    pub vibration_enabled: bool,
    pub persistent_notification: bool,
}

/// Stored form of an active alarm; one element of the active-alarm array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmEntity {
    pub id: String,
    pub destination: DestinationEntity,
    pub settings: AlarmSettingsEntity,
    #[serde(default)]
    pub geofence_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

fn to_iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_iso(field: &str, value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("{field} '{value}' is not an ISO-8601 timestamp: {e}"))
}

impl From<&Alarm> for AlarmEntity {
    fn from(alarm: &Alarm) -> Self {
        Self {
            id: alarm.id.clone(),
            destination: DestinationEntity {
                id: alarm.destination.id.clone(),
                name: alarm.destination.name.clone(),
                coordinate: alarm.destination.coordinate,
                address: alarm.destination.address.clone(),
                created_at: to_iso(alarm.destination.created_at),
            },
            settings: AlarmSettingsEntity {
                trigger_radius: alarm.settings.trigger_radius,
                vibration_enabled: alarm.settings.vibration_enabled,
                persistent_notification: alarm.settings.persistent_notification,
            },
            geofence_id: alarm.geofence_id.clone(),
            is_active: alarm.is_active,
            created_at: to_iso(alarm.created_at),
        }
    }
}

impl TryFrom<AlarmEntity> for Alarm {
    type Error = String;

    fn try_from(entity: AlarmEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            destination: Destination {
                created_at: parse_iso("destination.createdAt", &entity.destination.created_at)?,
                id: entity.destination.id,
                name: entity.destination.name,
                coordinate: entity.destination.coordinate,
                address: entity.destination.address,
            },
            settings: AlarmSettings {
                trigger_radius: entity.settings.trigger_radius,
                vibration_enabled: entity.settings.vibration_enabled,
                persistent_notification: entity.settings.persistent_notification,
            },
            created_at: parse_iso("createdAt", &entity.created_at)?,
            id: entity.id,
            geofence_id: entity.geofence_id,
            is_active: entity.is_active,
        })
    }
}
