//! Configuration management with validation and defaults
//!
//! Values come from built-in defaults, an optional TOML file, then
//! `QUICKTHREE_*` environment overrides, in that order.

use crate::errors::{ConfigurationError, QuickThreeResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Longest draw cycle an administrator may configure, in minutes
pub const MAX_DRAW_CYCLE_MINUTES: u32 = 60;

/// Top-level service configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickThreeConfig {
    pub storage: StorageConfig,
    pub game: GameConfig,
    pub monitoring: MonitoringConfig,
}

/// Ledger and round-cache persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    pub cache_directory: String,
    pub write_buffer_size_mb: usize,
    pub max_write_buffer_number: i32,
    pub target_file_size_mb: usize,
    pub compression_type: CompressionType,
    /// Whether to clear both databases on startup (testing only!)
    pub clear_on_start: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Snappy,
    Lz4,
    Zstd,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/ledger".to_string(),
            cache_directory: "./DB/round_cache".to_string(),
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
            target_file_size_mb: 64,
            compression_type: CompressionType::Lz4,
            clear_on_start: false,
        }
    }
}

/// Round defaults applied to newly seeded groups, plus draw pacing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub default_draw_cycle_minutes: u32,
    pub default_simple_odds: Decimal,
    pub default_triplet_odds: Decimal,
    /// Pause between the dice landing and the result announcement
    pub result_delay_ms: u64,
    /// Disable gameplay when the bot is the only member left in the chat
    pub participation_guard: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_draw_cycle_minutes: 1,
            default_simple_odds: Decimal::from(2),
            default_triplet_odds: Decimal::from(10),
            result_delay_ms: 3_000,
            participation_guard: true,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
        }
    }
}

impl QuickThreeConfig {
    /// Configuration for tests: no result pause, throwaway databases
    pub fn testing() -> Self {
        Self {
            storage: StorageConfig {
                clear_on_start: true,
                ..Default::default()
            },
            game: GameConfig {
                result_delay_ms: 0,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
            },
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.storage.data_directory.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "storage.data_directory".to_string(),
            ));
        }

        if self.storage.cache_directory.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "storage.cache_directory".to_string(),
            ));
        }

        if self.storage.data_directory == self.storage.cache_directory {
            return Err(ConfigValidationError::LogicalInconsistency(
                "ledger and round cache must use separate directories".to_string(),
            ));
        }

        if self.game.default_draw_cycle_minutes == 0
            || self.game.default_draw_cycle_minutes > MAX_DRAW_CYCLE_MINUTES
        {
            return Err(ConfigValidationError::InvalidValue(format!(
                "default_draw_cycle_minutes must be 1-{}",
                MAX_DRAW_CYCLE_MINUTES
            )));
        }

        if self.game.default_simple_odds <= Decimal::ZERO
            || self.game.default_triplet_odds <= Decimal::ZERO
        {
            return Err(ConfigValidationError::InvalidValue(
                "default odds must be > 0".to_string(),
            ));
        }

        if Duration::from_millis(self.game.result_delay_ms)
            >= Duration::from_secs(u64::from(self.game.default_draw_cycle_minutes) * 60)
        {
            return Err(ConfigValidationError::LogicalInconsistency(
                "result delay must be shorter than the draw cycle".to_string(),
            ));
        }

        Ok(())
    }

    pub fn result_delay(&self) -> Duration {
        Duration::from_millis(self.game.result_delay_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidValue(String),
    LogicalInconsistency(String),
    MissingRequired(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigValidationError::LogicalInconsistency(msg) => {
                write!(f, "Configuration logical inconsistency: {}", msg)
            }
            ConfigValidationError::MissingRequired(msg) => write!(f, "Missing required configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> QuickThreeResult<QuickThreeConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => QuickThreeConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;

        config
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> QuickThreeResult<QuickThreeConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        Self::parse(&content)
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn parse(content: &str) -> QuickThreeResult<QuickThreeConfig> {
        toml::from_str(content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(config: &mut QuickThreeConfig) -> QuickThreeResult<()> {
        if let Ok(data_dir) = env::var("QUICKTHREE_DATA_DIR") {
            config.storage.data_directory = data_dir;
        }
        if let Ok(cache_dir) = env::var("QUICKTHREE_CACHE_DIR") {
            config.storage.cache_directory = cache_dir;
        }
        if let Ok(delay) = env::var("QUICKTHREE_RESULT_DELAY_MS") {
            config.game.result_delay_ms = delay.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "QUICKTHREE_RESULT_DELAY_MS".to_string(),
                value: delay,
                reason: "Invalid millisecond value".to_string(),
            })?;
        }
        if let Ok(level) = env::var("QUICKTHREE_LOG_LEVEL") {
            config.monitoring.log_level = level.parse().map_err(|reason| ConfigurationError::InvalidValue {
                field: "QUICKTHREE_LOG_LEVEL".to_string(),
                value: level,
                reason,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = QuickThreeConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = QuickThreeConfig::testing();
        assert!(config.validate().is_ok());
        assert_eq!(config.result_delay(), Duration::ZERO);
    }

    #[test]
    fn test_draw_cycle_bounds() {
        let mut config = QuickThreeConfig::default();
        config.game.default_draw_cycle_minutes = 0;
        assert!(config.validate().is_err());

        config.game.default_draw_cycle_minutes = 61;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_directories_rejected() {
        let mut config = QuickThreeConfig::default();
        config.storage.cache_directory = config.storage.data_directory.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::LogicalInconsistency(_))
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ConfigLoader::parse(
            r#"
            [game]
            default_draw_cycle_minutes = 5
            default_triplet_odds = "24"

            [monitoring]
            log_level = "Debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.game.default_draw_cycle_minutes, 5);
        assert_eq!(config.game.default_triplet_odds, Decimal::from(24));
        assert_eq!(config.game.default_simple_odds, Decimal::from(2));
        assert_eq!(config.monitoring.log_level, LogLevel::Debug);
        assert_eq!(config.storage.data_directory, "./DB/ledger");
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Trace.as_filter(), "trace");
    }
}
