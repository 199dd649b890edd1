//! Configuration loading for the Lyrix central service
//!
//! Configuration file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LYRIX_CONFIG`)
//! 3. Platform config directory (`<config_dir>/lyrix/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing configuration file is not an error: a warning is logged and the
//! compiled defaults are used. A file that exists but cannot be read or parsed
//! is reported as [`Error::Config`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "LYRIX_CONFIG";

/// Default position poll interval: one tick per frame at 24 fps
pub const DEFAULT_POSITION_UPDATE_INTERVAL_MS: u64 = 1000 / 24;

/// Smallest position poll interval accepted at runtime
pub const MIN_POSITION_UPDATE_INTERVAL_MS: u64 = 16;

/// Central service configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CentralConfig {
    /// Interval between position fast-path reads (milliseconds)
    ///
    /// Default: 41ms (~24 Hz). Clamped to `min_position_update_interval_ms`.
    #[serde(default = "default_position_update_interval_ms")]
    pub position_update_interval_ms: u64,

    /// Lower bound applied to every requested position interval
    ///
    /// Default: 16ms. Values below 16 are raised to 16.
    #[serde(default = "default_min_position_update_interval_ms")]
    pub min_position_update_interval_ms: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log filter directive (trace, debug, info, warn, error, or EnvFilter syntax)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_position_update_interval_ms() -> u64 {
    DEFAULT_POSITION_UPDATE_INTERVAL_MS
}

fn default_min_position_update_interval_ms() -> u64 {
    MIN_POSITION_UPDATE_INTERVAL_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            position_update_interval_ms: default_position_update_interval_ms(),
            min_position_update_interval_ms: default_min_position_update_interval_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CentralConfig {
    /// Parse configuration from TOML text and normalize bounds
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CentralConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        Ok(config.normalized())
    }

    /// Load configuration from an explicit file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load configuration using the documented priority order
    ///
    /// # Arguments
    /// * `cli_path` - Path given on the command line, if any
    ///
    /// # Returns
    /// Loaded configuration, or compiled defaults when no file exists
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("No config file location available, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Position poll interval after clamping, as a `Duration`
    pub fn position_update_interval(&self) -> Duration {
        Duration::from_millis(self.clamp_interval_ms(self.position_update_interval_ms))
    }

    /// Clamp a requested interval to the configured minimum
    pub fn clamp_interval_ms(&self, requested_ms: u64) -> u64 {
        requested_ms.max(self.min_position_update_interval_ms)
    }

    fn normalized(mut self) -> Self {
        if self.min_position_update_interval_ms < MIN_POSITION_UPDATE_INTERVAL_MS {
            warn!(
                "min_position_update_interval_ms {} below {}, raising",
                self.min_position_update_interval_ms, MIN_POSITION_UPDATE_INTERVAL_MS
            );
            self.min_position_update_interval_ms = MIN_POSITION_UPDATE_INTERVAL_MS;
        }
        self.position_update_interval_ms =
            self.clamp_interval_ms(self.position_update_interval_ms);
        self
    }
}

/// Determine which configuration file should be consulted
fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir().map(|d| d.join("lyrix").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CentralConfig::default();
        assert_eq!(config.position_update_interval_ms, 41);
        assert_eq!(config.min_position_update_interval_ms, 16);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.position_update_interval(), Duration::from_millis(41));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = CentralConfig::from_toml_str("").unwrap();
        assert_eq!(config, CentralConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = CentralConfig::from_toml_str(
            r#"
            position_update_interval_ms = 100

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.position_update_interval_ms, 100);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let config = CentralConfig::from_toml_str("position_update_interval_ms = 5").unwrap();
        assert_eq!(config.position_update_interval_ms, 16);
        assert_eq!(config.clamp_interval_ms(1), 16);
        assert_eq!(config.clamp_interval_ms(250), 250);
    }

    #[test]
    fn test_minimum_cannot_go_below_floor() {
        let config = CentralConfig::from_toml_str(
            "min_position_update_interval_ms = 2\nposition_update_interval_ms = 8",
        )
        .unwrap();
        assert_eq!(config.min_position_update_interval_ms, 16);
        assert_eq!(config.position_update_interval_ms, 16);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = CentralConfig::from_toml_str("position_update_interval_ms = \"fast\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
