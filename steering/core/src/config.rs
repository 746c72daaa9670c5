//! TOML Configuration File Support
//!
//! Configuration for the steering queue, loaded from
//! `~/.config/steering/steering.toml` with environment overrides.
//!
//! # Configuration Priority
//!
//! Values are applied in the following order (highest first):
//! 1. Environment variables
//! 2. TOML configuration file
//! 3. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [queue]
//! max_depth = 100
//!
//! [shutdown]
//! # 0 waits for the queue to drain however long it takes
//! stop_timeout_ms = 5000
//! ```
//!
//! # Environment Variables
//!
//! - `STEERING_MAX_QUEUE_DEPTH`: queue capacity
//! - `STEERING_STOP_TIMEOUT_MS`: drain timeout on stop (0 = wait forever)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::DEFAULT_MAX_DEPTH;

/// Environment variable overriding the queue capacity
pub const ENV_MAX_QUEUE_DEPTH: &str = "STEERING_MAX_QUEUE_DEPTH";
/// Environment variable overriding the stop timeout
pub const ENV_STOP_TIMEOUT_MS: &str = "STEERING_STOP_TIMEOUT_MS";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Queue section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueToml {
    /// Maximum number of queued messages
    pub max_depth: Option<usize>,
}

/// Shutdown section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownToml {
    /// How long `stop` waits for the queue to drain (0 = no limit)
    pub stop_timeout_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringToml {
    /// Queue configuration section
    pub queue: QueueToml,

    /// Shutdown configuration section
    pub shutdown: ShutdownToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Configuration for a [`ConversationManager`](crate::ConversationManager)
#[derive(Clone, Debug)]
pub struct SteeringConfig {
    /// Maximum queue depth
    pub max_queue_depth: usize,

    /// Drain timeout used by callers that stop with the configured limit
    pub stop_timeout: Option<Duration>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: DEFAULT_MAX_DEPTH,
            stop_timeout: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl SteeringConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue depth
    #[must_use]
    pub fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Set the stop timeout
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a zero queue depth.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_depth == 0 {
            return Err(ConfigError::ValidationError(
                "queue max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/steering/steering.toml` or
/// `~/.config/steering/steering.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("steering").join("steering.toml"))
}

/// Load configuration from the default path and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// resulting values are invalid. A missing config file is not an error.
pub fn load_config() -> Result<SteeringConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting values are invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<SteeringConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_config(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Load defaults and the TOML file, without environment overrides
fn load_file_config(path: Option<PathBuf>) -> Result<SteeringConfig, ConfigError> {
    let mut config = SteeringConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_config = read_toml(&config_path)?;
            apply_toml_config(&mut config, &toml_config);
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
            config.config_file_path = Some(config_path);
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

fn read_toml(path: &Path) -> Result<SteeringToml, ConfigError> {
    let toml_content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&toml_content)?)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut SteeringConfig, toml: &SteeringToml) {
    if let Some(depth) = toml.queue.max_depth {
        config.max_queue_depth = depth;
    }
    if let Some(ms) = toml.shutdown.stop_timeout_ms {
        config.stop_timeout = timeout_from_ms(ms);
    }
}

/// Apply environment overrides, reading variables through `lookup`
fn apply_env_config(config: &mut SteeringConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(depth) = lookup(ENV_MAX_QUEUE_DEPTH) {
        match depth.trim().parse::<usize>() {
            Ok(n) => {
                config.max_queue_depth = n;
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %depth, "Ignoring invalid {ENV_MAX_QUEUE_DEPTH}"),
        }
    }
    if let Some(timeout) = lookup(ENV_STOP_TIMEOUT_MS) {
        match timeout.trim().parse::<u64>() {
            Ok(ms) => {
                config.stop_timeout = timeout_from_ms(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid {ENV_STOP_TIMEOUT_MS}"),
        }
    }
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
