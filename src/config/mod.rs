//! # Configuration
//!
//! Explicit, validated configuration for the orchestration core. Values load
//! from an optional file layered under `ONBOARD__`-prefixed environment
//! overrides; nothing falls back silently to hardcoded values outside the
//! documented defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Backoff and retry bounds for the retry executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Total attempts per execution round, including the first call
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Cap on every computed or upstream-requested delay, in milliseconds
    pub max_delay_ms: u64,
    /// Exponential growth factor
    pub multiplier: f64,
    /// Whether to randomize delays to avoid thundering herds
    pub jitter_enabled: bool,
    /// Maximum jitter fraction (0.0 to 1.0)
    pub max_jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
            multiplier: 2.0,
            jitter_enabled: true,
            max_jitter: 0.1,
        }
    }
}

/// Execution bounds for resume rounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Concurrent Action Executor calls per round; external browser and
    /// network actions are resource-heavy
    pub max_concurrent_sub_steps: usize,
    /// Retry limit applied to sub-steps whose template does not override it
    pub default_retry_limit: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sub_steps: 4,
            default_retry_limit: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON-formatted log lines
    pub json_logging: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl TelemetryConfig {
    /// Install the global tracing subscriber; later calls are no-ops.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.clone()));
        if self.json_logging {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .try_init();
        } else {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init();
        }
    }
}

/// Root configuration for the orchestration core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardConfig {
    pub backoff: BackoffConfig,
    pub execution: ExecutionConfig,
    pub telemetry: TelemetryConfig,
}

impl OnboardConfig {
    /// Load from environment overrides only (`ONBOARD__SECTION__KEY`)
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::load_layered(None)
    }

    /// Load from the given file plus environment overrides
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigurationError> {
        Self::load_layered(Some(path))
    }

    fn load_layered(path: Option<&std::path::Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix("ONBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations that would break the retry or planning math.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.backoff.max_attempts == 0 {
            return Err(ConfigurationError::Invalid(
                "backoff.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigurationError::Invalid(
                "backoff.multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.max_jitter) {
            return Err(ConfigurationError::Invalid(
                "backoff.max_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(ConfigurationError::Invalid(
                "backoff.max_delay_ms must be at least base_delay_ms".to_string(),
            ));
        }
        if self.execution.max_concurrent_sub_steps == 0 {
            return Err(ConfigurationError::Invalid(
                "execution.max_concurrent_sub_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
