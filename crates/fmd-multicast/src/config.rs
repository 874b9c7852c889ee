//! Multicast transport configuration.

use crate::error::MulticastError;

/// Addresses and interfaces to open multicast endpoints for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MulticastConfig {
    /// IPv4 multicast address or host name. `None` or empty disables IPv4.
    pub ipv4: Option<String>,
    /// IPv6 multicast address. `None` or empty disables IPv6.
    pub ipv6: Option<String>,
    /// UDP port.
    pub port: u16,
    /// Interface allow-list for IPv6. Empty allows every suitable interface.
    pub interfaces: Vec<String>,
}

impl MulticastConfig {
    /// The IPv4 address, if IPv4 is enabled.
    pub fn ipv4(&self) -> Option<&str> {
        non_empty(self.ipv4.as_deref())
    }

    /// The IPv6 address, if IPv6 is enabled.
    pub fn ipv6(&self) -> Option<&str> {
        non_empty(self.ipv6.as_deref())
    }

    /// Whether the interface may carry IPv6 multicast.
    pub fn allows_interface(&self, name: &str) -> bool {
        self.interfaces.is_empty() || self.interfaces.iter().any(|allowed| allowed == name)
    }

    /// Check that there is something to dial.
    pub fn validate(&self) -> Result<(), MulticastError> {
        if self.ipv4().is_none() && self.ipv6().is_none() {
            return Err(MulticastError::InvalidConfig(
                "neither IPv4 nor IPv6 multicast address has been defined".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(MulticastError::InvalidConfig(
                "no UDP port number has been defined".to_string(),
            ));
        }

        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_addresses_are_disabled() {
        let config = MulticastConfig {
            ipv4: Some(String::new()),
            ipv6: None,
            port: 54321,
            interfaces: Vec::new(),
        };
        assert!(config.ipv4().is_none());
        assert!(matches!(
            config.validate(),
            Err(MulticastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_port_required() {
        let config = MulticastConfig {
            ipv4: Some("224.0.0.1".to_string()),
            port: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MulticastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_allow_list() {
        let mut config = MulticastConfig::default();
        assert!(config.allows_interface("eth0"));

        config.interfaces = vec!["wlan0".to_string()];
        assert!(!config.allows_interface("eth0"));
        assert!(config.allows_interface("wlan0"));
    }
}
