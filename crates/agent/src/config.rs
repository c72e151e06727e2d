use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// API root including the version prefix, e.g. `https://api.example.com/api/v1`.
    #[serde(default)]
    pub base_url: String,

    /// Bearer token sent with every request, if set.
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cadence and timeouts of the location tracking session.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Seconds between periodic location reports.
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Bound on the one-shot permission/first-fix request.
    #[serde(default = "default_initial_fix_timeout")]
    pub initial_fix_timeout_secs: u64,

    /// Bound on each fix of the continuous watch.
    #[serde(default = "default_watch_timeout")]
    pub watch_timeout_secs: u64,

    /// Maximum age of a cached fix accepted by the continuous watch.
    #[serde(default = "default_watch_maximum_age")]
    pub watch_maximum_age_secs: u64,
}

impl TrackingConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn initial_fix_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_fix_timeout_secs)
    }

    pub fn watch_timeout(&self) -> Duration {
        Duration::from_secs(self.watch_timeout_secs)
    }

    pub fn watch_maximum_age(&self) -> Duration {
        Duration::from_secs(self.watch_maximum_age_secs)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
            initial_fix_timeout_secs: default_initial_fix_timeout(),
            watch_timeout_secs: default_watch_timeout(),
            watch_maximum_age_secs: default_watch_maximum_age(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Maximum stops encoded in one navigation link.
    #[serde(default = "default_max_waypoints")]
    pub max_waypoints: usize,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_waypoints: default_max_waypoints(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_request_timeout() -> u64 {
    15
}
fn default_report_interval() -> u64 {
    120
}
fn default_initial_fix_timeout() -> u64 {
    10
}
fn default_watch_timeout() -> u64 {
    30
}
fn default_watch_maximum_age() -> u64 {
    5
}
fn default_max_waypoints() -> usize {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
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
    /// 3. Environment variables with FIELDTECH__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("FIELDTECH").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [backend]
            base_url = ""
            timeout_secs = 15

            [tracking]
            report_interval_secs = 120
            initial_fix_timeout_secs = 10
            watch_timeout_secs = 30
            watch_maximum_age_secs = 5

            [route]
            max_waypoints = 10

            [logging]
            level = "info"
            format = "pretty"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FIELDTECH__BACKEND__BASE_URL environment variable must be set".to_string(),
            ));
        }

        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(ConfigValidationError::InvalidValue(
                "backend.base_url must be an http(s) URL".to_string(),
            ));
        }

        if self.tracking.report_interval_secs == 0
            || self.tracking.initial_fix_timeout_secs == 0
            || self.tracking.watch_timeout_secs == 0
        {
            return Err(ConfigValidationError::InvalidValue(
                "Tracking intervals and timeouts must be greater than 0".to_string(),
            ));
        }

        if self.route.max_waypoints < 2 {
            return Err(ConfigValidationError::InvalidValue(
                "route.max_waypoints must be at least 2".to_string(),
            ));
        }

        Ok(())
    }
}
