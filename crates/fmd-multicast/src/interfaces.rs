//! Network interface enumeration.

use std::io;

use tracing::trace;

/// A network interface as seen by the multicast resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Interface name, used as IPv6 zone.
    pub name: String,
    /// Interface index, used as IPv6 scope id.
    pub index: u32,
    /// Administratively up.
    pub up: bool,
    /// Supports multicast.
    pub multicast: bool,
}

impl InterfaceInfo {
    /// Whether multicast datagrams can be sent on this interface.
    pub fn is_multicast_capable(&self) -> bool {
        self.up && self.multicast
    }
}

/// List the network interfaces in operating system order, one entry per name.
#[cfg(unix)]
pub fn list_interfaces() -> io::Result<Vec<InterfaceInfo>> {
    use nix::net::if_::{InterfaceFlags, if_nametoindex};

    let addrs = nix::ifaddrs::getifaddrs().map_err(io::Error::from)?;
    let mut interfaces: Vec<InterfaceInfo> = Vec::new();

    for addr in addrs {
        if interfaces.iter().any(|i| i.name == addr.interface_name) {
            continue;
        }

        let index = match if_nametoindex(addr.interface_name.as_str()) {
            Ok(index) => index,
            Err(e) => {
                trace!("No index for interface {}: {}", addr.interface_name, e);
                continue;
            }
        };

        interfaces.push(InterfaceInfo {
            up: addr.flags.contains(InterfaceFlags::IFF_UP),
            multicast: addr.flags.contains(InterfaceFlags::IFF_MULTICAST),
            name: addr.interface_name,
            index,
        });
    }

    Ok(interfaces)
}

/// List the network interfaces in operating system order, one entry per name.
///
/// Interface flags are not available here, so every interface is reported as
/// up and multicast capable.
#[cfg(not(unix))]
pub fn list_interfaces() -> io::Result<Vec<InterfaceInfo>> {
    use network_interface::{NetworkInterface, NetworkInterfaceConfig};

    let found = NetworkInterface::show().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let mut interfaces: Vec<InterfaceInfo> = Vec::new();

    for iface in found {
        if interfaces.iter().any(|i| i.name == iface.name) {
            continue;
        }
        trace!("Found interface {} (index {})", iface.name, iface.index);
        interfaces.push(InterfaceInfo {
            name: iface.name,
            index: iface.index,
            up: true,
            multicast: true,
        });
    }

    Ok(interfaces)
}
