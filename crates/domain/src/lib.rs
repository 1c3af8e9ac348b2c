//! Domain layer for the transit alarm engine.
//!
//! This crate contains:
//! - Domain models (Destination, AlarmSettings, Alarm, GeofenceRegion)
//! - The notification dispatcher interface
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::AlarmError;
