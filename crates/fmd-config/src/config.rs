//! Main configuration structure.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_ADVERTISE_INTERVAL, DEFAULT_MULTICAST_IP4, DEFAULT_MULTICAST_IP6, DEFAULT_PORT,
};

/// Settings shared by all commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// IPv4 multicast address for local network communication. Empty disables IPv4.
    #[serde(rename = "MulticastIP4")]
    pub multicast_ip4: String,

    /// IPv6 multicast address for local network communication. Empty disables IPv6.
    #[serde(rename = "MulticastIP6")]
    pub multicast_ip6: String,

    /// Network interfaces used for IPv6 multicast. Empty means all suitable interfaces.
    #[serde(rename = "InterfaceIP6", skip_serializing_if = "Vec::is_empty")]
    pub interface_ip6: Vec<String>,

    /// UDP port for local network communication.
    #[serde(rename = "Port")]
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            multicast_ip4: DEFAULT_MULTICAST_IP4.to_string(),
            multicast_ip6: DEFAULT_MULTICAST_IP6.to_string(),
            interface_ip6: Vec::new(),
            port: DEFAULT_PORT,
        }
    }
}

impl GeneralConfig {
    /// Check that at least one multicast address can be dialled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.multicast_ip4.trim().is_empty() && self.multicast_ip6.trim().is_empty() {
            return Err(ConfigError::NoAddress);
        }

        if self.port == 0 {
            return Err(ConfigError::NoPort);
        }

        Ok(())
    }
}

/// Settings of the `advertise` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertiseConfig {
    /// Send device announcements on the local network.
    #[serde(rename = "Multicast")]
    pub multicast: bool,

    /// Seconds between advertisements.
    #[serde(rename = "Interval")]
    pub interval: u64,

    /// Optional name to group related devices.
    #[serde(rename = "Group")]
    pub group: String,

    /// Name of the device if not the system host name.
    #[serde(rename = "DeviceName")]
    pub device_name: String,
}

impl Default for AdvertiseConfig {
    fn default() -> Self {
        Self {
            multicast: true,
            interval: DEFAULT_ADVERTISE_INTERVAL,
            group: String::new(),
            device_name: String::new(),
        }
    }
}

impl AdvertiseConfig {
    /// Interval between two advertisements. Never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }
}

/// Settings of the `listen` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Maximum number of seconds to listen (0 = until interrupted).
    #[serde(rename = "Timeout")]
    pub timeout: u64,
}

impl ListenConfig {
    /// Listen timeout, `None` when listening until interrupted.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

/// Complete program configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "General", default)]
    pub general: GeneralConfig,

    #[serde(rename = "Advertise", default)]
    pub advertise: AdvertiseConfig,

    #[serde(rename = "Listen", default)]
    pub listen: ListenConfig,
}

impl Config {
    /// Parse configuration from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self, ConfigError> {
        let data = Self::strip_bom(data);
        serde_json::from_slice(data).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_json(&data)
    }

    /// Serialize configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Strip a UTF-8 byte order mark if present.
    fn strip_bom(data: &[u8]) -> &[u8] {
        match data.strip_prefix(b"\xEF\xBB\xBF") {
            Some(rest) => rest,
            None => {
                if data.starts_with(b"\xFF\xFE") || data.starts_with(b"\xFE\xFF") {
                    tracing::warn!("UTF-16 encoded config files are not supported");
                }
                data
            }
        }
    }
}

/// Split a comma-separated interface list, dropping empty entries.
pub fn parse_interface_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("neither IPv4 nor IPv6 multicast address has been defined")]
    NoAddress,
    #[error("no UDP port number has been defined")]
    NoPort,
    #[error("failed to read configuration file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
}
