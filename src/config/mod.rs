use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application configuration stored as TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Device to control when `--mac` is not given. Skips discovery.
    pub device_address: Option<String>,
    /// Fixed RFCOMM channel, bypassing the SDP lookup.
    pub rfcomm_channel: Option<u8>,
    /// BlueZ adapter name such as `hci1`. Default adapter when unset.
    pub adapter: Option<String>,
}

impl AppConfig {
    /// Config file path: ~/.config/ambictl/config.toml
    pub fn path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ambictl");
        config_dir.join("config.toml")
    }

    /// Load the default config file, or return defaults.
    pub fn load() -> Self {
        let path = Self::path();
        if path.exists() {
            match Self::load_from(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring config: {:#}", e),
            }
        }
        Self::default()
    }

    /// Load an explicitly requested config file. Any failure is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!("Config loaded from {}", path.display());
        Ok(config)
    }
}
