//! Configuration sections

use crate::constants::{DEFAULT_CATALOG_URL, DEFAULT_HELPER_PORT};
use serde::{Deserialize, Serialize};
use sideload_types::{ColorChoice, Endpoint, OutputFormat};
use std::path::PathBuf;

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
        }
    }
}

/// Pipeline scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stages allowed to run at once across a batch, 0 = auto-detect
    #[serde(default)]
    pub max_concurrent_stages: usize,
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,
    /// Lifetime of a freshly signed provisioning profile
    #[serde(default = "default_profile_validity_days")]
    pub profile_validity_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_stages: 0,
            stage_timeout_secs: default_stage_timeout(),
            profile_validity_days: default_profile_validity_days(),
        }
    }
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub data_dir: Option<PathBuf>,
    pub apps_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
}

/// App catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub source_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source_url: default_catalog_url(),
        }
    }
}

/// A statically configured helper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_helper_port")]
    pub port: u16,
}

impl From<&EndpointConfig> for Endpoint {
    fn from(config: &EndpointConfig) -> Self {
        Endpoint::new(&config.name, &config.host, config.port)
    }
}

/// Helper discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Connect timeout used when probing endpoints
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// External resign command
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SigningConfig {
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64, // seconds
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_stage_timeout() -> u64 {
    300
}

fn default_profile_validity_days() -> u32 {
    7
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_helper_port() -> u16 {
    DEFAULT_HELPER_PORT
}

fn default_probe_timeout_ms() -> u64 {
    1500
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}
