//! Configuration System
//!
//! TOML config files with environment variable overrides. Credential
//! profiles live only in the file and are only ever selected explicitly;
//! there is no environment override for tokens and no implicit default
//! profile.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::resources::DEFAULT_MAX_RESOURCES;
use crate::results::DEFAULT_ROW_LIMIT;
use crate::service::ResultSource;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

/// Query service connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub result_source: ResultSource,
}

fn default_endpoint() -> String {
    "http://localhost:8088".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            result_source: ResultSource::default(),
        }
    }
}

/// Query execution defaults, overridable per run on the command line
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    #[serde(default = "default_max_resources")]
    pub max_resources: usize,
}

fn default_limit() -> usize {
    DEFAULT_ROW_LIMIT
}

fn default_update_interval() -> u64 {
    30
}

fn default_max_resources() -> usize {
    DEFAULT_MAX_RESOURCES
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            update_interval_secs: default_update_interval(),
            max_resources: default_max_resources(),
        }
    }
}

/// One credential profile
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    pub token: String,

    /// Optional per-profile endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("lookout").join("config.toml")),
            Some(PathBuf::from("/etc/lookout/config.toml")),
            Some(PathBuf::from("./lookout.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Look up a credential profile by name
    pub fn profile(&self, name: &str) -> Result<&ProfileConfig, ConfigError> {
        self.profiles.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.profiles.keys().map(|k| k.as_str()).collect();
            available.sort_unstable();
            ConfigError::ProfileNotFound {
                name: name.to_string(),
                available: if available.is_empty() {
                    "none defined".to_string()
                } else {
                    available.join(", ")
                },
            }
        })
    }

    /// Apply environment variable overrides to an existing config.
    ///
    /// Tokens deliberately have no override; credentials stay in the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("LOOKOUT_ENDPOINT") {
            self.service.endpoint = endpoint;
        }
        if let Ok(interval) = std::env::var("LOOKOUT_UPDATE_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                self.query.update_interval_secs = secs;
            }
        }

        if let Ok(level) = std::env::var("LOOKOUT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOOKOUT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Profile '{name}' not found in config (available: {available})")]
    ProfileNotFound { name: String, available: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Lookout Configuration
#
# Environment variables override these settings:
# - LOOKOUT_ENDPOINT
# - LOOKOUT_UPDATE_INTERVAL
# - LOOKOUT_LOG_LEVEL
# - LOOKOUT_LOG_FORMAT
#
# Tokens have no environment override; keep them in this file.

[service]
# Query service endpoint
endpoint = "http://localhost:8088"

# Per-request timeout in seconds
request_timeout_secs = 30

# How the service hands back results: "paginated" or "bulk"
result_source = "paginated"

[query]
# Maximum rows to retrieve
limit = 10000

# Seconds between status polls
update_interval_secs = 30

# The service caps queries at this many resources
max_resources = 20

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for terminals) or json
format = "pretty"

# Credential profiles, selected with --profile. Endpoint is optional and
# overrides [service].endpoint for that profile.
[profiles.default]
token = ""
# endpoint = "https://logs.example.com"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service.endpoint, "http://localhost:8088");
        assert_eq!(config.query.limit, DEFAULT_ROW_LIMIT);
        assert_eq!(config.query.update_interval_secs, 30);
        assert_eq!(config.query.max_resources, DEFAULT_MAX_RESOURCES);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let file = write_config(
            r#"
            [service]
            endpoint = "https://logs.example.com"
            result_source = "bulk"

            [profiles.prod]
            token = "secret"
            "#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.service.endpoint, "https://logs.example.com");
        assert_eq!(config.service.result_source, ResultSource::Bulk);
        assert_eq!(config.service.request_timeout_secs, 30);
        assert_eq!(config.query.limit, DEFAULT_ROW_LIMIT);

        let profile = config.profile("prod").unwrap();
        assert_eq!(profile.token, "secret");
        assert!(profile.endpoint.is_none());
    }

    #[test]
    fn test_unknown_profile_lists_what_exists() {
        let file = write_config(
            r#"
            [profiles.dev]
            token = "a"

            [profiles.prod]
            token = "b"
            "#,
        );

        let config = Config::load(file.path()).unwrap();
        let err = config.profile("staging").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("staging"));
        assert!(message.contains("dev, prod"));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let file = write_config("not toml [[[");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.profiles.contains_key("default"));
    }
}
