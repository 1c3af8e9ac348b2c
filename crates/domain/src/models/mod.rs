//! Domain models for the transit alarm engine.

pub mod alarm;
pub mod destination;
pub mod monitoring;
pub mod region;

pub use alarm::{
    Alarm, AlarmDistance, AlarmSettings, AlarmSettingsUpdate, CreateAlarmResult, TriggerSource,
    DUPLICATE_LOCATION_THRESHOLD_METERS, MAX_TRIGGER_RADIUS_METERS, MIN_TRIGGER_RADIUS_METERS,
};
pub use destination::Destination;
pub use monitoring::{MonitoringMode, MonitoringStatus};
pub use region::{GeofenceRegion, RegionEnterEvent};
