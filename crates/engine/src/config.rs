use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Most regions a platform will monitor for one app (iOS caps this at 20).
pub const PLATFORM_REGION_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub alarms: AlarmsConfig,
    #[serde(default)]
    pub geofence: GeofenceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the file-backed key-value store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlarmsConfig {
    /// Destinations closer than this are merged into one alarm.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold_meters: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    /// Ceiling on concurrently armed regions, at most [`PLATFORM_REGION_LIMIT`].
    #[serde(default = "default_max_regions")]
    pub max_regions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_base_interval")]
    pub base_interval_secs: u64,

    /// Interval used when approaching the target or when the radius is small.
    #[serde(default = "default_approach_interval")]
    pub approach_interval_secs: u64,

    /// Interval used when far away from the target.
    #[serde(default = "default_far_interval")]
    pub far_interval_secs: u64,

    /// Radii at or below this always use the approach interval.
    #[serde(default = "default_small_radius")]
    pub small_radius_meters: f64,

    /// "Approaching" means distance <= radius * approach_factor.
    #[serde(default = "default_approach_factor")]
    pub approach_factor: f64,

    /// "Far" means distance > radius * far_factor.
    #[serde(default = "default_far_factor")]
    pub far_factor: f64,

    /// Upper bound on a single position request.
    #[serde(default = "default_location_timeout")]
    pub location_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Name the background task is registered under with the platform.
    #[serde(default = "default_task_name")]
    pub task_name: String,

    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    #[serde(default = "default_min_displacement")]
    pub min_displacement_meters: f64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_duplicate_threshold() -> f64 {
    domain::models::DUPLICATE_LOCATION_THRESHOLD_METERS
}
fn default_max_regions() -> usize {
    PLATFORM_REGION_LIMIT
}
fn default_base_interval() -> u64 {
    30
}
fn default_approach_interval() -> u64 {
    15
}
fn default_far_interval() -> u64 {
    60
}
fn default_small_radius() -> f64 {
    100.0
}
fn default_approach_factor() -> f64 {
    2.0
}
fn default_far_factor() -> f64 {
    10.0
}
fn default_location_timeout() -> u64 {
    20
}
fn default_task_name() -> String {
    "transit-alarm-location".to_string()
}
fn default_min_interval() -> u64 {
    15
}
fn default_min_displacement() -> f64 {
    50.0
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for AlarmsConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold_meters: default_duplicate_threshold(),
        }
    }
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            max_regions: default_max_regions(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: default_base_interval(),
            approach_interval_secs: default_approach_interval(),
            far_interval_secs: default_far_interval(),
            small_radius_meters: default_small_radius(),
            approach_factor: default_approach_factor(),
            far_factor: default_far_factor(),
            location_timeout_secs: default_location_timeout(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            task_name: default_task_name(),
            min_interval_secs: default_min_interval(),
            min_displacement_meters: default_min_displacement(),
        }
    }
}

impl PollingConfig {
    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.base_interval_secs)
    }

    pub fn approach_interval(&self) -> Duration {
        Duration::from_secs(self.approach_interval_secs)
    }

    pub fn far_interval(&self) -> Duration {
        Duration::from_secs(self.far_interval_secs)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }
}

impl TrackingConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with TA__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("TA").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds entirely from defaults and overrides, without touching config files.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [logging]
            level = "info"
            format = "pretty"

            [storage]
            data_dir = "data"

            [alarms]
            duplicate_threshold_meters = 50.0

            [geofence]
            max_regions = 20

            [polling]
            base_interval_secs = 30
            approach_interval_secs = 15
            far_interval_secs = 60
            small_radius_meters = 100.0
            approach_factor = 2.0
            far_factor = 10.0
            location_timeout_secs = 20

            [tracking]
            task_name = "transit-alarm-location"
            min_interval_secs = 15
            min_displacement_meters = 50.0
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.logging
            .validate()
            .map_err(|e| ConfigValidationError::InvalidValue(format!("logging: {e}")))?;

        if self.tracking.task_name.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "tracking.task_name must be set".to_string(),
            ));
        }

        if !(1..=PLATFORM_REGION_LIMIT).contains(&self.geofence.max_regions) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "geofence.max_regions must be between 1 and {PLATFORM_REGION_LIMIT}"
            )));
        }

        let p = &self.polling;
        if p.approach_interval_secs == 0 || p.base_interval_secs == 0 || p.far_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "polling intervals must be positive".to_string(),
            ));
        }
        if !(p.approach_interval_secs <= p.base_interval_secs
            && p.base_interval_secs <= p.far_interval_secs)
        {
            return Err(ConfigValidationError::InvalidValue(
                "polling intervals must satisfy approach <= base <= far".to_string(),
            ));
        }
        if p.approach_factor <= 0.0 || p.far_factor <= p.approach_factor {
            return Err(ConfigValidationError::InvalidValue(
                "polling factors must satisfy 0 < approach_factor < far_factor".to_string(),
            ));
        }

        if self.alarms.duplicate_threshold_meters < 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "alarms.duplicate_threshold_meters cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_with_defaults() {
        let config = Config::load_for_test(&[]).expect("Failed to load config");

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.geofence.max_regions, 20);
        assert_eq!(config.polling.base_interval(), Duration::from_secs(30));
        assert_eq!(config.polling.approach_interval(), Duration::from_secs(15));
        assert_eq!(config.polling.far_interval(), Duration::from_secs(60));
        assert_eq!(config.tracking.min_interval(), Duration::from_secs(15));
        assert_eq!(config.tracking.min_displacement_meters, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let loaded = Config::load_for_test(&[]).unwrap();
        let built = Config::default();

        assert_eq!(loaded.alarms.duplicate_threshold_meters, built.alarms.duplicate_threshold_meters);
        assert_eq!(loaded.polling.small_radius_meters, built.polling.small_radius_meters);
        assert_eq!(loaded.polling.location_timeout_secs, built.polling.location_timeout_secs);
        assert_eq!(loaded.tracking.task_name, built.tracking.task_name);
        assert_eq!(loaded.storage.data_dir, built.storage.data_dir);
    }

    #[test]
    fn test_config_override() {
        let config = Config::load_for_test(&[
            ("geofence.max_regions", "5"),
            ("logging.level", "debug"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.geofence.max_regions, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_validation_zero_regions() {
        let config = Config::load_for_test(&[("geofence.max_regions", "0")]).unwrap();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("max_regions"));
    }

    #[test]
    fn test_config_validation_regions_above_platform_limit() {
        let config = Config::load_for_test(&[("geofence.max_regions", "100")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("between 1 and 20"));

        let config = Config::load_for_test(&[("geofence.max_regions", "20")]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_log_format() {
        let config = Config::load_for_test(&[("logging.format", "xml")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging"));
    }

    #[test]
    fn test_config_validation_interval_order() {
        let config = Config::load_for_test(&[("polling.approach_interval_secs", "45")]).unwrap();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("approach <= base <= far"));
    }

    #[test]
    fn test_config_validation_blank_task_name() {
        let config = Config::load_for_test(&[("tracking.task_name", " ")]).unwrap();
        assert!(config.validate().is_err());
    }
}
