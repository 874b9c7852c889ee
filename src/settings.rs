//! Effective configuration: defaults, then the configuration file, then the
//! command line.

use std::path::Path;

use fmd_config::{Config, ConfigError, GeneralConfig, parse_interface_list};
use fmd_multicast::MulticastConfig;

/// Command line values overriding the `General` section.
#[derive(Debug, Clone, Default)]
pub struct GeneralOverrides {
    pub multicast_ip4: Option<String>,
    pub multicast_ip6: Option<String>,
    /// Comma-separated interface names.
    pub interface_ip6: Option<String>,
    pub port: Option<u16>,
}

impl GeneralOverrides {
    pub fn apply(&self, general: &mut GeneralConfig) {
        if let Some(address) = &self.multicast_ip4 {
            general.multicast_ip4 = address.clone();
        }
        if let Some(address) = &self.multicast_ip6 {
            general.multicast_ip6 = address.clone();
        }
        if let Some(list) = &self.interface_ip6 {
            general.interface_ip6 = parse_interface_list(list);
        }
        if let Some(port) = self.port {
            general.port = port;
        }
    }
}

/// Load the configuration file, if any, and apply the overrides.
pub fn load_config(
    path: Option<&Path>,
    overrides: &GeneralOverrides,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    overrides.apply(&mut config.general);
    Ok(config)
}

/// Transport settings for the multicast endpoints.
pub fn multicast_config(general: &GeneralConfig) -> MulticastConfig {
    MulticastConfig {
        ipv4: Some(general.multicast_ip4.clone()),
        ipv6: Some(general.multicast_ip6.clone()),
        port: general.port,
        interfaces: general.interface_ip6.clone(),
    }
}
