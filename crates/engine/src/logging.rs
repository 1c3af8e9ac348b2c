//! Logging initialization and configuration.

use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{level}': {source}")]
    InvalidLevel {
        level: String,
        #[source]
        source: ParseError,
    },

    #[error("Unsupported log format '{0}', expected json or pretty")]
    UnsupportedFormat(String),

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LoggingConfig {
    pub fn log_format(&self) -> Result<LogFormat, LoggingError> {
        match self.format.as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(LoggingError::UnsupportedFormat(other.to_string())),
        }
    }

    fn configured_filter(&self) -> Result<EnvFilter, LoggingError> {
        EnvFilter::try_new(&self.level).map_err(|source| LoggingError::InvalidLevel {
            level: self.level.clone(),
            source,
        })
    }

    /// Checks the format and level without installing anything.
    pub fn validate(&self) -> Result<(), LoggingError> {
        self.log_format()?;
        self.configured_filter().map(|_| ())
    }
}

/// Initializes the logging subsystem based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let format = config.log_format()?;
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.configured_filter()?,
    };

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_target(true);
            subscriber.with(json_layer).try_init()?;
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true);
            subscriber.with(pretty_layer).try_init()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: format.to_string(),
        }
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(logging("info", "json").log_format().unwrap(), LogFormat::Json);
        assert_eq!(logging("info", "pretty").log_format().unwrap(), LogFormat::Pretty);
        assert!(matches!(
            logging("info", "xml").log_format(),
            Err(LoggingError::UnsupportedFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn test_validate_accepts_directives() {
        assert!(LoggingConfig::default().validate().is_ok());
        assert!(logging("warn,transit_alarm_engine=debug", "json").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_format() {
        let err = logging("info", "yaml").validate().unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }
}
