use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::monitor::MAX_WAIT_SECS;
use crate::notifications::models::ChannelConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Lower bound of the wait between checks, in seconds.
    pub min_wait_secs: u64,
    /// Upper bound of the wait between checks, in seconds (inclusive).
    pub max_wait_secs: u64,
    pub train_name: String,
    /// Host the check endpoint accepts booking URLs for.
    pub allowed_host: String,
    pub request_timeout_secs: u64,
    pub listen_address: String,
    pub frontend_origin: String,
    /// When set, checks are delegated to this check server instead of scraping locally.
    pub api_url: Option<String>,
    pub log_dir: String,
    pub channels: Vec<ChannelConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_wait_secs: 180,
            max_wait_secs: 300,
            train_name: "BENGAWAN".to_string(),
            allowed_host: "booking.kai.id".to_string(),
            request_timeout_secs: 10,
            listen_address: "0.0.0.0:8000".to_string(),
            frontend_origin: "http://localhost:5173".to_string(),
            api_url: None,
            log_dir: "logs".to_string(),
            channels: Vec::new(),
        }
    }
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialMonitorConfig {
    min_wait_secs: Option<u64>,
    max_wait_secs: Option<u64>,
    train_name: Option<String>,
    allowed_host: Option<String>,
    request_timeout_secs: Option<u64>,
    listen_address: Option<String>,
    frontend_origin: Option<String>,
    api_url: Option<String>,
    log_dir: Option<String>,
    #[serde(default)]
    channels: Option<Vec<ChannelConfig>>,
}

// Channels are structured, so they only come from the file.
#[derive(Deserialize, Default, Debug)]
struct EnvMonitorConfig {
    min_wait_secs: Option<u64>,
    max_wait_secs: Option<u64>,
    train_name: Option<String>,
    allowed_host: Option<String>,
    request_timeout_secs: Option<u64>,
    listen_address: Option<String>,
    frontend_origin: Option<String>,
    api_url: Option<String>,
    log_dir: Option<String>,
}

impl MonitorConfig {
    /// Loads `.env`, then layers: defaults, the TOML file (if it exists), process environment.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_from(config_path, std::env::vars())
    }

    pub fn load_from<I>(config_path: Option<&str>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) if Path::new(path_str).exists() => {
                let contents = fs::read_to_string(path_str).map_err(|source| ConfigError::Read {
                    path: path_str.to_string(),
                    source,
                })?;
                info!(path = %path_str, "Loaded configuration file.");
                toml::from_str::<PartialMonitorConfig>(&contents).map_err(|source| {
                    ConfigError::Parse {
                        path: path_str.to_string(),
                        source,
                    }
                })?
            }
            _ => PartialMonitorConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: EnvMonitorConfig = envy::from_iter(env)?;

        // 3. Merge: environment overrides file
        let defaults = MonitorConfig::default();
        let config = MonitorConfig {
            min_wait_secs: env_config
                .min_wait_secs
                .or(file_config.min_wait_secs)
                .unwrap_or(defaults.min_wait_secs),
            max_wait_secs: env_config
                .max_wait_secs
                .or(file_config.max_wait_secs)
                .unwrap_or(defaults.max_wait_secs),
            train_name: env_config
                .train_name
                .or(file_config.train_name)
                .unwrap_or(defaults.train_name),
            allowed_host: env_config
                .allowed_host
                .or(file_config.allowed_host)
                .unwrap_or(defaults.allowed_host),
            request_timeout_secs: env_config
                .request_timeout_secs
                .or(file_config.request_timeout_secs)
                .unwrap_or(defaults.request_timeout_secs),
            listen_address: env_config
                .listen_address
                .or(file_config.listen_address)
                .unwrap_or(defaults.listen_address),
            frontend_origin: env_config
                .frontend_origin
                .or(file_config.frontend_origin)
                .unwrap_or(defaults.frontend_origin),
            api_url: env_config.api_url.or(file_config.api_url),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or(defaults.log_dir),
            channels: file_config.channels.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wait_secs == 0 {
            return Err(ConfigError::Invalid("max_wait_secs must be positive".to_string()));
        }
        if self.max_wait_secs > MAX_WAIT_SECS {
            return Err(ConfigError::Invalid(format!(
                "max_wait_secs ({}) must not exceed {MAX_WAIT_SECS}",
                self.max_wait_secs
            )));
        }
        if self.min_wait_secs > self.max_wait_secs {
            return Err(ConfigError::Invalid(format!(
                "min_wait_secs ({}) must not exceed max_wait_secs ({})",
                self.min_wait_secs, self.max_wait_secs
            )));
        }
        if self.train_name.trim().is_empty() {
            return Err(ConfigError::Invalid("train_name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
