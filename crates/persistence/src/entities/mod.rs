//! Entity definitions: the JSON shapes written to storage.
//!
//! Timestamps are stored as ISO-8601 strings, never as native date values,
//! so snapshots stay readable by any collaborator sharing the store.

pub mod alarm;
pub mod region;

pub use alarm::{AlarmEntity, AlarmSettingsEntity, DestinationEntity};
pub use region::RegionEntity;
