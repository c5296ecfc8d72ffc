//! Configuration loading
//!
//! Everything has a default: without a config file the tracker watches the
//! built-in devices on the public FOTA server.

use anyhow::{Context, Result};
use fota_tracker_core::{DeviceRegistry, DeviceSpec, FirmwareVariant, FOTA_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Tracked devices; the built-in registry is used when empty
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Directory holding the snapshot files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// HTTP timeout per feed request
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// FOTA server base URL used to derive feed URLs
    #[serde(default = "default_base_url")]
    pub fota_base_url: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            timeout_secs: default_timeout(),
            fota_base_url: default_base_url(),
        }
    }
}

fn default_data_dir() -> String {
    "firmware_data".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_base_url() -> String {
    FOTA_BASE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name
    pub name: String,
    /// Hardware model identifier
    pub model: String,
    /// Region/carrier code
    pub csc: String,
    /// Override for the stable feed URL
    #[serde(default)]
    pub stable_url: Option<String>,
    /// Override for the test feed URL
    #[serde(default)]
    pub test_url: Option<String>,
}

impl DeviceConfig {
    fn to_spec(&self, base_url: &str) -> DeviceSpec {
        let mut spec = DeviceSpec::on_fota_server(base_url, &self.name, &self.model, &self.csc);
        if let Some(url) = &self.stable_url {
            spec.urls.insert(FirmwareVariant::Stable, url.clone());
        }
        if let Some(url) = &self.test_url {
            spec.urls.insert(FirmwareVariant::Test, url.clone());
        }
        spec
    }
}

impl Config {
    /// Build the immutable device registry handed to the monitor
    pub fn to_registry(&self) -> DeviceRegistry {
        let base_url = &self.tracker.fota_base_url;
        if self.devices.is_empty() {
            return DeviceRegistry::builtin(base_url);
        }
        DeviceRegistry::new(self.devices.iter().map(|d| d.to_spec(base_url)).collect())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.tracker.data_dir)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.tracker.timeout_secs)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!(path = %path.display(), devices = config.devices.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using built-in devices"
        );
        Ok(Config::default())
    }
}
