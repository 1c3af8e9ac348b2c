//! Domain services for the transit alarm engine.
//!
//! Services here are interfaces to external collaborators, plus
//! development implementations of them.

pub mod notification;

pub use notification::{AlarmNotifier, MockAlarmNotifier, NotificationRecord, NotifyError};
