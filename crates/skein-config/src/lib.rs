//! # Skein DNS Configuration
//!
//! YAML-first configuration with sensible defaults. JSON and TOML are
//! accepted too, selected by file extension.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod listeners;
pub mod resolver;

pub use listeners::ListenerConfig;
pub use resolver::{ResolverConfig, ResolverMode};

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File read failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML syntax or shape error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML syntax or shape error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Semantic validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// A field holding a value it cannot hold.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration file does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,

    /// Network listeners.
    pub listeners: ListenerConfig,

    /// Resolver behavior.
    pub resolver: ResolverConfig,

    /// Cache sizing and TTL clamps.
    pub cache: CacheConfig,

    /// Logging.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a file, picking the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };

        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validates all sections.
    pub fn validate(&self) -> Result<()> {
        self.listeners.validate()?;
        self.resolver.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name used in logs.
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "skein".to_string(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached messages.
    pub max_messages: u64,

    /// Maximum number of cached RRsets.
    pub max_rrsets: u64,

    /// Minimum TTL for cached entries (seconds).
    pub min_ttl: u32,

    /// Maximum TTL for cached entries (seconds).
    pub max_ttl: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_messages: 100_000,
            max_rrsets: 200_000,
            min_ttl: 5,
            max_ttl: 86400 * 7,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        if self.min_ttl > self.max_ttl {
            return Err(ConfigError::InvalidValue {
                field: "cache.min_ttl".to_string(),
                message: "min_ttl cannot be greater than max_ttl".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,

    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
