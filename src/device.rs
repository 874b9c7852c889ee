//! Local device description.

use std::io;
use std::net::IpAddr;

use fmd_config::AdvertiseConfig;
use fmd_wire::{
    DeviceAdvertisement, DeviceInformation, InterfaceDescriptor, NetworkAddress, NetworkInterface,
};
use network_interface::{Addr, NetworkInterfaceConfig};
use tracing::warn;

/// Host name of this machine, empty if it cannot be determined.
pub fn host_name() -> String {
    system_host_name()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_default()
}

#[cfg(unix)]
fn system_host_name() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => Some(name.to_string_lossy().into_owned()),
        Err(e) => {
            warn!("Failed to query host name: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn system_host_name() -> Option<String> {
    None
}

/// Advertisement for this device. The device name falls back to the host name.
pub fn advertisement(config: &AdvertiseConfig) -> DeviceAdvertisement {
    let host_name = host_name();

    DeviceAdvertisement {
        group: config.group.clone(),
        device_name: device_name(config, &host_name),
        host_name,
    }
}

/// Detailed information about this device.
///
/// Interfaces that cannot be listed are logged and left out.
pub fn information(config: &AdvertiseConfig) -> DeviceInformation {
    let host_name = host_name();
    let network_interfaces = network_interfaces().unwrap_or_else(|e| {
        warn!("Failed to list network interfaces: {}", e);
        Vec::new()
    });

    DeviceInformation {
        group: config.group.clone(),
        device_name: device_name(config, &host_name),
        host_name,
        operating_system: std::env::consts::OS.to_string(),
        network_interfaces,
    }
}

/// Network interfaces with their unicast addresses, one entry per interface.
pub fn network_interfaces() -> io::Result<Vec<NetworkInterface>> {
    let found = network_interface::NetworkInterface::show()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let mut interfaces: Vec<NetworkInterface> = Vec::new();

    for iface in found {
        let addresses = iface.addr.iter().map(network_address);

        if let Some(known) = interfaces
            .iter_mut()
            .find(|known| known.interface.name == iface.name)
        {
            known.addresses.extend(addresses);
            continue;
        }

        interfaces.push(NetworkInterface {
            interface: InterfaceDescriptor {
                index: iface.index,
                name: iface.name.clone(),
                hardware_addr: iface.mac_addr.clone().filter(|mac| !mac.is_empty()),
            },
            addresses: addresses.collect(),
            multicast: Vec::new(),
        });
    }

    Ok(interfaces)
}

fn device_name(config: &AdvertiseConfig, host_name: &str) -> String {
    if config.device_name.is_empty() {
        host_name.to_string()
    } else {
        config.device_name.clone()
    }
}

fn network_address(addr: &Addr) -> NetworkAddress {
    let (ip, prefix) = match addr {
        Addr::V4(v4) => (
            IpAddr::V4(v4.ip),
            v4.netmask.map(|mask| u32::from(mask).count_ones()),
        ),
        Addr::V6(v6) => (
            IpAddr::V6(v6.ip),
            v6.netmask.map(|mask| u128::from(mask).count_ones()),
        ),
    };

    match prefix {
        Some(prefix) => NetworkAddress {
            network: "ip+net".to_string(),
            address: format!("{}/{}", ip, prefix),
        },
        None => NetworkAddress {
            network: "ip".to_string(),
            address: ip.to_string(),
        },
    }
}
