//! Repository implementations for snapshot storage.

pub mod alarm;
pub mod region;

pub use alarm::{AlarmRepository, ALARMS_KEY};
pub use region::{RegionRepository, REGIONS_KEY};
