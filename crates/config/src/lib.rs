#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for sideload
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/sideload/config.toml)
//! - Environment variables (`SIDELOAD_*`)
//! - CLI flags

pub mod constants;
pub mod sections;

pub use sections::{
    CatalogConfig, DiscoveryConfig, EndpointConfig, GeneralConfig, NetworkConfig, PathConfig,
    PipelineConfig, SigningConfig,
};

use serde::{Deserialize, Serialize};
use sideload_errors::{ConfigError, Error};
use sideload_types::{ColorChoice, Endpoint, OutputFormat};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join(constants::APP_DIR_NAME)
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit path, or fall back to [`Config::load`]
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Write the configuration as TOML, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub async fn save_to_file(&self, path: &Path) -> Result<(), Error> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            error: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }
        fs::write(path, contents)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(output) = std::env::var("SIDELOAD_OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => return Err(invalid("SIDELOAD_OUTPUT", output)),
            };
        }

        if let Ok(color) = std::env::var("SIDELOAD_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => return Err(invalid("SIDELOAD_COLOR", color)),
            };
        }

        if let Ok(stages) = std::env::var("SIDELOAD_MAX_CONCURRENT_STAGES") {
            self.pipeline.max_concurrent_stages = stages
                .parse()
                .map_err(|_| invalid("SIDELOAD_MAX_CONCURRENT_STAGES", stages))?;
        }

        if let Ok(timeout) = std::env::var("SIDELOAD_STAGE_TIMEOUT") {
            self.pipeline.stage_timeout_secs = match timeout.parse() {
                Ok(0) | Err(_) => return Err(invalid("SIDELOAD_STAGE_TIMEOUT", timeout)),
                Ok(secs) => secs,
            };
        }

        if let Ok(url) = std::env::var("SIDELOAD_CATALOG_URL") {
            if url.is_empty() {
                return Err(invalid("SIDELOAD_CATALOG_URL", url));
            }
            self.catalog.source_url = url;
        }

        // SIDELOAD_HELPER=host[:port] prepends a helper endpoint
        if let Ok(helper) = std::env::var("SIDELOAD_HELPER") {
            self.prefer_helper(&helper)
                .map_err(|_| invalid("SIDELOAD_HELPER", helper))?;
        }

        if let Ok(signer) = std::env::var("SIDELOAD_SIGNER") {
            self.signing.command = Some(PathBuf::from(signer));
        }

        Ok(())
    }

    /// Put the helper at `host[:port]` first in the endpoint list
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn prefer_helper(&mut self, address: &str) -> Result<(), Error> {
        let endpoint = parse_helper(address).ok_or_else(|| invalid("helper", address.to_string()))?;
        self.discovery.endpoints.retain(|existing| existing != &endpoint);
        self.discovery.endpoints.insert(0, endpoint);
        Ok(())
    }

    /// Root directory for sideload data (with default)
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(constants::APP_DIR_NAME)
        })
    }

    /// Directory holding one cached package directory per app
    #[must_use]
    pub fn apps_dir(&self) -> PathBuf {
        self.paths
            .apps_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join(constants::APPS_DIR_NAME))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .database_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(constants::DB_FILE_NAME))
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join(constants::LOGS_DIR_NAME)
    }

    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.stage_timeout_secs)
    }

    /// Statically configured helper endpoints, in preference order
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.discovery.endpoints.iter().map(Endpoint::from).collect()
    }
}

fn invalid(field: &str, value: String) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
    }
    .into()
}

fn parse_helper(value: &str) -> Option<EndpointConfig> {
    let (host, port) = match value.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (value, constants::DEFAULT_HELPER_PORT),
    };
    if host.is_empty() {
        return None;
    }
    Some(EndpointConfig {
        name: host.to_string(),
        host: host.to_string(),
        port,
    })
}

/// Number of stages allowed to run at once
#[must_use]
pub fn calculate_stage_concurrency(config_value: usize) -> usize {
    if config_value > 0 {
        config_value
    } else {
        // Stages are mostly I/O bound, allow two per CPU
        (num_cpus::get() * 2).max(2)
    }
}
