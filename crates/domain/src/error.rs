//! Domain error types.

use thiserror::Error;

/// Errors surfaced by alarm operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlarmError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Service unavailable: {0}")]
    ServicesUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Capacity exceeded: at most {limit} monitored regions")]
    CapacityExceeded { limit: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Alarm manager is not initialized")]
    NotInitialized,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AlarmError {
    /// Short machine-readable code, used as a log and metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            AlarmError::PermissionDenied(_) => "permission_denied",
            AlarmError::ServicesUnavailable(_) => "services_unavailable",
            AlarmError::InvalidInput(_) => "invalid_input",
            AlarmError::CapacityExceeded { .. } => "capacity_exceeded",
            AlarmError::NotFound(_) => "not_found",
            AlarmError::Timeout(_) => "timeout",
            AlarmError::Storage(_) => "storage",
            AlarmError::NotInitialized => "not_initialized",
            AlarmError::Unknown(_) => "unknown",
        }
    }
}

impl From<validator::ValidationErrors> for AlarmError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect();

        // Nested structs (e.g. a destination's coordinate) report separately.
        for (field, kind) in errors.errors() {
            if let validator::ValidationErrorsKind::Struct(inner) = kind {
                let inner: AlarmError = (**inner).clone().into();
                if let AlarmError::InvalidInput(message) = inner {
                    details.push(format!("{field}.{message}"));
                }
            }
        }

        details.sort();
        AlarmError::InvalidInput(details.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    #[test]
    fn test_error_codes() {
        assert_eq!(AlarmError::NotFound("x".into()).code(), "not_found");
        assert_eq!(
            AlarmError::CapacityExceeded { limit: 20 }.code(),
            "capacity_exceeded"
        );
        assert_eq!(AlarmError::NotInitialized.code(), "not_initialized");
    }

    #[test]
    fn test_error_display() {
        let err = AlarmError::CapacityExceeded { limit: 20 };
        assert_eq!(err.to_string(), "Capacity exceeded: at most 20 monitored regions");
    }

    #[test]
    fn test_from_validation_errors() {
        let mut errors = ValidationErrors::new();
        let mut err = ValidationError::new("range");
        err.message = Some("Trigger radius must be between 50 and 2000 meters".into());
        errors.add("trigger_radius", err);

        let converted: AlarmError = errors.into();
        assert_eq!(
            converted,
            AlarmError::InvalidInput(
                "trigger_radius: Trigger radius must be between 50 and 2000 meters".into()
            )
        );
    }

    #[test]
    fn test_from_validation_errors_without_message_uses_code() {
        let mut errors = ValidationErrors::new();
        errors.add("name", ValidationError::new("length"));
        let converted: AlarmError = errors.into();
        assert_eq!(converted, AlarmError::InvalidInput("name: length".into()));
    }
}
