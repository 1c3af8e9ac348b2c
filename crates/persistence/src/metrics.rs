//! Storage metrics collection.
//!
//! Provides functions for recording key-value store metrics.

use metrics::{counter, histogram};
use std::time::Instant;

/// Record a store operation duration.
pub fn record_operation_duration(operation: &str, duration_secs: f64) {
    histogram!(
        "kv_store_operation_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// Record a failed store operation.
pub fn record_operation_failure(operation: &str) {
    counter!(
        "kv_store_operation_failures_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// A helper to time store operations and record metrics.
///
/// Usage:
/// ```ignore
/// let timer = StoreTimer::new("save_alarms");
/// let result = store.set(ALARMS_KEY, &json).await;
/// timer.record();
/// result
/// ```
pub struct StoreTimer {
    operation: String,
    start: Instant,
}

impl StoreTimer {
    /// Create a new timer for the given operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration to metrics.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_operation_duration(&self.operation, duration);
    }

    /// Record the elapsed duration and count the operation as failed.
    pub fn record_failure(self) {
        record_operation_failure(&self.operation);
        self.record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_timer_creation() {
        let timer = StoreTimer::new("load_alarms");
        assert_eq!(timer.operation, "load_alarms");
    }

    #[test]
    fn test_store_timer_record_without_recorder() {
        // With no recorder installed the metrics facade is a no-op.
        StoreTimer::new("save_regions").record();
        StoreTimer::new("save_regions").record_failure();
    }
}
