//! Transit alarm engine.
//!
//! Wakes a traveller near their destination. Alarms are watched by OS
//! geofences where possible, by a polling fallback where not, and by a
//! background location task in both cases. [`manager::AlarmManager`] owns
//! the active set and arbitrates between the three detection paths.

pub mod config;
pub mod geofence;
pub mod logging;
pub mod manager;
pub mod polling;
pub mod providers;
pub mod simulation;
pub mod tracking;

pub use crate::config::Config;
pub use crate::manager::{AlarmManager, EvaluationSummary, Platform};
