//! Configuration management for garden-export
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::export::{DEFAULT_PRIORITY_COLUMNS, InjectionGuard};
use crate::flatten::FlattenOptions;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "GARDEN_EXPORT_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Export limits and behaviour
    #[serde(default)]
    pub export: ExportConfig,

    /// Column ordering
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Cell sanitisation
    #[serde(default)]
    pub guard: GuardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Export limits and behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Rows exported when the request does not name a limit
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Largest limit a request may ask for
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    /// Records requested per store page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pages fetched before the run is capped
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Wall-clock budget for one run in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// When the header is computed
    #[serde(default)]
    pub header_policy: HeaderPolicy,

    /// Positional columns kept per ranked-alternatives list (None = all)
    #[serde(default)]
    pub max_ranked_alternatives: Option<usize>,

    /// Write a "No data found" line for empty results
    #[serde(default = "default_empty_notice")]
    pub empty_notice: bool,
}

/// When the CSV header is fixed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeaderPolicy {
    /// Buffer every row up to the cap and plan the header from the full
    /// key superset.
    #[default]
    Buffered,

    /// Plan the header from the first page plus the shape's declared
    /// columns and write pages as they arrive. Keys outside the plan are
    /// dropped.
    Streaming,
}

/// Column ordering configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Columns placed first, in this order, when present
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
}

/// Cell sanitisation configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Leave plain signed decimals such as `-74.006` unprefixed
    #[serde(default)]
    pub allow_signed_numbers: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_limit() -> u64 {
    5000
}

fn default_max_limit() -> u64 {
    50_000
}

fn default_page_size() -> usize {
    1000
}

fn default_max_pages() -> u32 {
    50
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_empty_notice() -> bool {
    true
}

fn default_priority() -> Vec<String> {
    DEFAULT_PRIORITY_COLUMNS.iter().map(|s| s.to_string()).collect()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
            header_policy: HeaderPolicy::default(),
            max_ranked_alternatives: None,
            empty_notice: default_empty_notice(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(format!("{}: {e}", path.display()))
            }
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration with file and environment precedence
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present and defaults otherwise.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GARDEN_EXPORT_*` overrides
    ///
    /// Example: GARDEN_EXPORT_MAX_LIMIT=10000
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "DEFAULT_LIMIT" => self.export.default_limit = parse_env(&key, &value)?,
                "MAX_LIMIT" => self.export.max_limit = parse_env(&key, &value)?,
                "PAGE_SIZE" => self.export.page_size = parse_env(&key, &value)?,
                "MAX_PAGES" => self.export.max_pages = parse_env(&key, &value)?,
                "TIMEOUT_SECS" => self.export.timeout_secs = parse_env(&key, &value)?,
                "MAX_RANKED_ALTERNATIVES" => {
                    self.export.max_ranked_alternatives = Some(parse_env(&key, &value)?)
                }
                "EMPTY_NOTICE" => self.export.empty_notice = parse_env(&key, &value)?,
                "ALLOW_SIGNED_NUMBERS" => {
                    self.guard.allow_signed_numbers = parse_env(&key, &value)?
                }
                "HEADER_POLICY" => {
                    self.export.header_policy = match value.to_ascii_lowercase().as_str() {
                        "buffered" => HeaderPolicy::Buffered,
                        "streaming" => HeaderPolicy::Streaming,
                        _ => return Err(invalid(&key, &value)),
                    }
                }
                "LOG_LEVEL" => {
                    self.logging.level = match value.to_ascii_lowercase().as_str() {
                        "error" => LogLevel::Error,
                        "warn" => LogLevel::Warn,
                        "info" => LogLevel::Info,
                        "debug" => LogLevel::Debug,
                        "trace" => LogLevel::Trace,
                        _ => return Err(invalid(&key, &value)),
                    }
                }
                _ => tracing::debug!("Ignoring unknown environment override {}", key),
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".garden-export")
            .join("config.toml")
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let export = &self.export;

        if export.max_limit == 0 {
            return Err(invalid("export.max_limit", "0"));
        }
        if export.default_limit == 0 || export.default_limit > export.max_limit {
            return Err(invalid(
                "export.default_limit",
                &export.default_limit.to_string(),
            ));
        }
        if export.page_size == 0 {
            return Err(invalid("export.page_size", "0"));
        }
        if export.max_pages == 0 {
            return Err(invalid("export.max_pages", "0"));
        }
        if export.timeout_secs == 0 {
            return Err(invalid("export.timeout_secs", "0"));
        }
        if let Some(blank) = self.columns.priority.iter().find(|c| c.trim().is_empty()) {
            return Err(invalid("columns.priority", blank));
        }

        Ok(())
    }

    /// Wall-clock budget for one run
    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export.timeout_secs)
    }

    /// Cell guard built from the `[guard]` table
    pub fn injection_guard(&self) -> InjectionGuard {
        InjectionGuard {
            allow_signed_numbers: self.guard.allow_signed_numbers,
        }
    }

    /// Flattener options built from the `[export]` table
    pub fn flatten_options(&self) -> FlattenOptions {
        FlattenOptions {
            max_ranked_alternatives: self.export.max_ranked_alternatives,
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}
