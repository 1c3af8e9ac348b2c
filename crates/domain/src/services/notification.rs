//! Notification dispatcher for alarm alerts.
//!
//! The platform renders sound, vibration and persistent notifications.
//! The engine only talks to it through [`AlarmNotifier`].

use std::sync::Mutex;

use thiserror::Error;

use crate::models::{Alarm, AlarmDistance};

/// Failure reported by a notification dispatcher.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Dispatcher for alarm alerts.
#[async_trait::async_trait]
pub trait AlarmNotifier: Send + Sync {
    /// Alert the user that an alarm fired. Called exactly once per firing.
    async fn show_triggered(&self, alarm: &Alarm) -> Result<(), NotifyError>;

    /// Update the ongoing status display with the surviving alarms' distances.
    async fn show_ongoing(&self, alarms: &[AlarmDistance]) -> Result<(), NotifyError>;

    /// Remove the ongoing status display, leaving arrival alerts in place.
    async fn clear_ongoing(&self) -> Result<(), NotifyError>;

    /// Remove every alarm notification.
    async fn clear_all(&self) -> Result<(), NotifyError>;
}

/// A dispatcher call captured by [`MockAlarmNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationRecord {
    Triggered { alarm_id: String },
    Ongoing { entries: Vec<(String, f64)> },
    OngoingCleared,
    Cleared,
}

/// Mock notifier for development and testing.
///
/// Logs every call and keeps a record of it instead of rendering anything.
#[derive(Debug, Default)]
pub struct MockAlarmNotifier {
    /// Whether to simulate dispatcher failures.
    pub simulate_failure: bool,
    records: Mutex<Vec<NotificationRecord>>,
}

impl MockAlarmNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock notifier whose every call fails (after being recorded).
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            records: Mutex::default(),
        }
    }

    /// All calls received so far, in order.
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Ids of alarms passed to `show_triggered`, in order.
    pub fn triggered_ids(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                NotificationRecord::Triggered { alarm_id } => Some(alarm_id),
                _ => None,
            })
            .collect()
    }

    /// The most recent `show_ongoing` payload, if any.
    pub fn last_ongoing(&self) -> Option<Vec<(String, f64)>> {
        self.records().into_iter().rev().find_map(|r| match r {
            NotificationRecord::Ongoing { entries } => Some(entries),
            _ => None,
        })
    }

    fn record(&self, record: NotificationRecord) -> Result<(), NotifyError> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
        if self.simulate_failure {
            tracing::warn!("Mock notifier simulating failure");
            return Err(NotifyError("Simulated failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AlarmNotifier for MockAlarmNotifier {
    async fn show_triggered(&self, alarm: &Alarm) -> Result<(), NotifyError> {
        tracing::info!(
            alarm_id = %alarm.id,
            destination = %alarm.destination.name,
            vibration = alarm.settings.vibration_enabled,
            "Mock: Would show arrival alert"
        );
        self.record(NotificationRecord::Triggered {
            alarm_id: alarm.id.clone(),
        })
    }

    async fn show_ongoing(&self, alarms: &[AlarmDistance]) -> Result<(), NotifyError> {
        let entries: Vec<(String, f64)> = alarms
            .iter()
            .map(|a| (a.alarm.id.clone(), a.distance_meters))
            .collect();
        match alarms {
            [single] => tracing::debug!(
                destination = %single.alarm.destination.name,
                distance_m = single.distance_meters.round(),
                "Mock: Would update ongoing notification"
            ),
            _ => tracing::debug!(
                alarms = alarms.len(),
                "Mock: Would update multi-alarm summary notification"
            ),
        }
        self.record(NotificationRecord::Ongoing { entries })
    }

    async fn clear_ongoing(&self) -> Result<(), NotifyError> {
        tracing::debug!("Mock: Would remove ongoing notification");
        self.record(NotificationRecord::OngoingCleared)
    }

    async fn clear_all(&self) -> Result<(), NotifyError> {
        tracing::debug!("Mock: Would clear all alarm notifications");
        self.record(NotificationRecord::Cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlarmSettings, Destination};
    use shared::Coordinate;

    fn alarm() -> Alarm {
        Alarm::new(
            Destination::new("Kashmere Gate", Coordinate::new(28.6675, 77.2282), None),
            AlarmSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_mock_notifier_records_calls() {
        let notifier = MockAlarmNotifier::new();
        let a = alarm();

        notifier.show_triggered(&a).await.unwrap();
        notifier
            .show_ongoing(&[AlarmDistance {
                alarm: a.clone(),
                distance_meters: 321.0,
            }])
            .await
            .unwrap();
        notifier.clear_ongoing().await.unwrap();
        notifier.clear_all().await.unwrap();

        assert_eq!(notifier.triggered_ids(), vec![a.id.clone()]);
        assert_eq!(notifier.last_ongoing(), Some(vec![(a.id.clone(), 321.0)]));
        let records = notifier.records();
        assert_eq!(
            records[records.len() - 2..],
            [NotificationRecord::OngoingCleared, NotificationRecord::Cleared]
        );
    }

    #[tokio::test]
    async fn test_mock_notifier_failure_still_records() {
        let notifier = MockAlarmNotifier::failing();
        let a = alarm();

        let result = notifier.show_triggered(&a).await;
        assert!(matches!(result, Err(NotifyError(_))));
        assert_eq!(notifier.triggered_ids(), vec![a.id]);
    }

    #[test]
    fn test_notify_error_display() {
        let err = NotifyError("channel missing".to_string());
        assert_eq!(err.to_string(), "Notification failed: channel missing");
    }
}
