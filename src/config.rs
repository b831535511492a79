use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::env as std_env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_STOREFRONT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STOREFRONT_API_VERSION: &str = "2024-10";
const DEFAULT_SWEEP_LOCK_TIMEOUT_MINUTES: i64 = 15;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default = "default_false_bool")]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Overall HTTP request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    // ========== Storefront API ==========
    /// Timeout for storefront price pushes (seconds)
    #[serde(default = "default_storefront_timeout_secs")]
    pub storefront_api_timeout_secs: u64,

    /// Storefront Admin API version segment
    #[serde(default = "default_storefront_api_version")]
    pub storefront_api_version: String,

    /// Sustained storefront call rate per store (calls per second)
    #[serde(default = "default_storefront_rate_limit_per_sec")]
    #[validate(custom = "validate_positive_rate")]
    pub storefront_rate_limit_per_sec: f64,

    /// Burst allowance per store on top of the sustained rate
    #[serde(default = "default_storefront_rate_limit_burst")]
    pub storefront_rate_limit_burst: u32,

    // ========== Pricing defaults ==========
    /// Percentage applied per increase step when an item has no explicit setting
    #[serde(default = "default_increment_percentage")]
    pub default_increment_percentage: Decimal,

    /// Hours between price evaluations per item
    #[serde(default = "default_period_hours")]
    #[validate(custom = "validate_positive_hours")]
    pub default_period_hours: i32,

    /// Revenue drop (percent) that triggers a revert
    #[serde(default = "default_revenue_drop_threshold_percent")]
    pub default_revenue_drop_threshold_percent: Decimal,

    /// Cool-down after a revert before increases resume
    #[serde(default = "default_wait_hours_after_revert")]
    #[validate(custom = "validate_positive_hours")]
    pub default_wait_hours_after_revert: i32,

    /// Ceiling as a percentage above the starting price
    #[serde(default = "default_max_increase_percentage")]
    pub default_max_increase_percentage: Decimal,

    /// Units each revenue window must contain before a comparison counts
    #[serde(default = "default_min_sales_per_window")]
    #[validate(custom = "validate_min_sales")]
    pub min_sales_per_window: u32,

    // ========== Sweep scheduling ==========
    /// Interval between automatic sweeps of all stores (seconds, 0 = disabled)
    #[serde(default)]
    pub sweep_interval_secs: u64,

    /// Minutes before an abandoned sweep lock is considered stale
    #[serde(default = "default_sweep_lock_timeout_minutes")]
    pub sweep_lock_timeout_minutes: i64,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates a new configuration with defaults for everything but the basics.
    /// Primarily used by tests.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            storefront_api_timeout_secs: default_storefront_timeout_secs(),
            storefront_api_version: default_storefront_api_version(),
            storefront_rate_limit_per_sec: default_storefront_rate_limit_per_sec(),
            storefront_rate_limit_burst: default_storefront_rate_limit_burst(),
            default_increment_percentage: default_increment_percentage(),
            default_period_hours: default_period_hours(),
            default_revenue_drop_threshold_percent: default_revenue_drop_threshold_percent(),
            default_wait_hours_after_revert: default_wait_hours_after_revert(),
            default_max_increase_percentage: default_max_increase_percentage(),
            min_sales_per_window: default_min_sales_per_window(),
            sweep_interval_secs: 0,
            sweep_lock_timeout_minutes: default_sweep_lock_timeout_minutes(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.default_increment_percentage <= Decimal::ZERO {
            let mut err = ValidationError::new("default_increment_percentage");
            err.message = Some("default_increment_percentage must be positive".into());
            errors.add("default_increment_percentage", err);
        }

        if self.default_max_increase_percentage <= Decimal::ZERO {
            let mut err = ValidationError::new("default_max_increase_percentage");
            err.message = Some("default_max_increase_percentage must be positive".into());
            errors.add("default_max_increase_percentage", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_false_bool() -> bool {
    false
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_storefront_timeout_secs() -> u64 {
    DEFAULT_STOREFRONT_TIMEOUT_SECS
}

fn default_storefront_api_version() -> String {
    DEFAULT_STOREFRONT_API_VERSION.to_string()
}

fn default_storefront_rate_limit_per_sec() -> f64 {
    2.0
}

fn default_storefront_rate_limit_burst() -> u32 {
    5
}

fn default_increment_percentage() -> Decimal {
    dec!(5)
}

fn default_period_hours() -> i32 {
    24
}

fn default_revenue_drop_threshold_percent() -> Decimal {
    dec!(10)
}

fn default_wait_hours_after_revert() -> i32 {
    72
}

fn default_max_increase_percentage() -> Decimal {
    dec!(30)
}

fn default_min_sales_per_window() -> u32 {
    2
}

fn default_sweep_lock_timeout_minutes() -> i64 {
    DEFAULT_SWEEP_LOCK_TIMEOUT_MINUTES
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate <= 0.0 {
        let mut err = ValidationError::new("storefront_rate_limit_per_sec");
        err.message = Some("storefront_rate_limit_per_sec must be a positive number".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive_hours(hours: i32) -> Result<(), ValidationError> {
    if hours <= 0 {
        let mut err = ValidationError::new("hours");
        err.message = Some("hour settings must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_min_sales(count: u32) -> Result<(), ValidationError> {
    if count == 0 {
        let mut err = ValidationError::new("min_sales_per_window");
        err.message = Some("min_sales_per_window must be at least 1".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("repricer_api={},tower_http=debug", level);
    let filter_directive = std_env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive.clone());

    // Optional OpenTelemetry initialization via env (APP__OTEL_ENABLED or OTEL_EXPORTER_OTLP_ENDPOINT)
    let otel_enabled = std_env::var("APP__OTEL_ENABLED")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
        || std_env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();

    if otel_enabled {
        #[allow(unused_imports)]
        use opentelemetry::{global, KeyValue};
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::{trace as sdktrace, Resource};

        let endpoint = std_env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4317".to_string());
        let service_name =
            std_env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "repricer-api".to_string());

        let resource = Resource::new(vec![KeyValue::new("service.name", service_name.clone())]);
        let tracer = match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint),
            )
            .with_trace_config(sdktrace::config().with_resource(resource))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => tracer,
            Err(err) => {
                error!("Failed to install OTLP pipeline: {}", err);
                if json {
                    let _ = fmt().with_env_filter(filter_directive).json().try_init();
                } else {
                    let _ = fmt().with_env_filter(filter_directive).try_init();
                }
                return;
            }
        };

        let base = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .with(EnvFilter::new(filter_directive.clone()));

        if json {
            let _ = base.with(fmt::layer().json()).try_init();
        } else {
            let _ = base.with(fmt::layer()).try_init();
        }
    } else {
        if json {
            let _ = fmt().with_env_filter(filter_directive).json().try_init();
        } else {
            let _ = fmt().with_env_filter(filter_directive).try_init();
        }
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Docker config (config/docker.toml) if DOCKER env var is set
/// 4. Environment variables (APP_*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let mut builder = Config::builder()
        .set_default("database_url", "sqlite://repricer.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    if env::var("DOCKER").is_ok() {
        info!("Docker environment detected");
        builder =
            builder.add_source(File::with_name(&format!("{}/docker", CONFIG_DIR)).required(false));
    }

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod cors_validation_tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://repricer.db?mode=memory".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_allows_override_flag() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn dev_skips_cors_requirement() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }
}
