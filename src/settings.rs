//! Agent settings
//!
//! Broker address, device identity and keep-alive, loaded from a TOML file in
//! the platform config directory with environment overrides on top. Missing
//! file means first run: defaults apply.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub broker: BrokerSettings,
    pub device: DeviceSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub device_id: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                host: "localhost".to_string(),
                port: 1883,
                keep_alive_secs: 30,
            },
            device: DeviceSettings {
                device_id: hostname::get()
                    .map(|h| h.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| "twinline-device".to_string()),
            },
        }
    }
}

impl AgentSettings {
    /// Load from the config file if present, then apply env overrides
    /// (`TWINLINE_BROKER_HOST`, `TWINLINE_BROKER_PORT`, `TWINLINE_DEVICE_ID`).
    pub async fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut settings = if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("invalid settings file {}", path.display()))?
        } else {
            Self::default()
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Config file location: `TWINLINE_CONFIG` wins, else the OS config dir.
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("TWINLINE_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir().context("could not determine config directory")?;
        path.push("twinline-agent");
        path.push("config.toml");
        Ok(path)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("TWINLINE_BROKER_HOST") {
            self.broker.host = host;
        }
        if let Ok(port) = std::env::var("TWINLINE_BROKER_PORT") {
            match port.parse() {
                Ok(port) => self.broker.port = port,
                Err(_) => warn!("ignoring non-numeric TWINLINE_BROKER_PORT: {port}"),
            }
        }
        if let Ok(device_id) = std::env::var("TWINLINE_DEVICE_ID") {
            self.device.device_id = device_id;
        }
    }
}
