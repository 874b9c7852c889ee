//! Turns a multicast configuration into a set of open endpoints.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::MulticastConfig;
use crate::endpoint::{Endpoint, UdpEndpoint};
use crate::error::MulticastError;
use crate::interfaces::{InterfaceInfo, list_interfaces};
use crate::multiplexer::Multiplexer;

/// Open one endpoint for the IPv4 address and one per eligible interface for
/// the IPv6 address.
///
/// Individual dial failures are logged and skipped. The IPv4 endpoint comes
/// first, followed by the IPv6 endpoints in interface order.
pub async fn resolve(config: &MulticastConfig) -> Result<Vec<Arc<dyn Endpoint>>, MulticastError> {
    config.validate()?;

    let mut endpoints: Vec<Arc<dyn Endpoint>> = Vec::new();

    if let Some(host) = config.ipv4() {
        match dial_v4(host, config.port).await {
            Ok(endpoint) => {
                debug!("Dialled {}", endpoint.remote_addr());
                endpoints.push(Arc::new(endpoint));
            }
            Err(e) => debug!("Skipping {}:{}: {}", host, config.port, e),
        }
    }

    if let Some(address) = config.ipv6() {
        match address.parse::<Ipv6Addr>() {
            Ok(group) => {
                for iface in eligible_interfaces(config)? {
                    let remote = SocketAddrV6::new(group, config.port, 0, iface.index);
                    match UdpEndpoint::dial(SocketAddr::V6(remote), Some(iface.name.clone())).await
                    {
                        Ok(endpoint) => {
                            debug!("Dialled [{}%{}]:{}", group, iface.name, config.port);
                            endpoints.push(Arc::new(endpoint));
                        }
                        Err(e) => debug!(
                            "Skipping [{}%{}]:{}: {}",
                            group, iface.name, config.port, e
                        ),
                    }
                }
            }
            Err(e) => debug!("Skipping IPv6 address {}: {}", address, e),
        }
    }

    if endpoints.is_empty() {
        return Err(MulticastError::NoEndpoint);
    }

    Ok(endpoints)
}

/// Resolve the configuration and wrap the endpoints in a [`Multiplexer`].
pub async fn dial(config: &MulticastConfig) -> Result<Multiplexer, MulticastError> {
    let endpoints = resolve(config).await?;
    info!("Opened {} multicast endpoint(s)", endpoints.len());
    Ok(Multiplexer::new(endpoints))
}

/// Open sockets bound to the configured port that receive the multicast
/// groups, wrapped in a [`Multiplexer`].
///
/// The IPv6 group is joined on every eligible interface.
pub async fn listen(config: &MulticastConfig) -> Result<Multiplexer, MulticastError> {
    config.validate()?;

    let mut endpoints: Vec<Arc<dyn Endpoint>> = Vec::new();

    if let Some(host) = config.ipv4() {
        match group_v4(host, config.port).await {
            Ok(group) => match UdpEndpoint::listen_v4(group, config.port) {
                Ok(endpoint) => endpoints.push(Arc::new(endpoint)),
                Err(e) => debug!("Not listening on {}:{}: {}", group, config.port, e),
            },
            Err(e) => debug!("Not listening on {}:{}: {}", host, config.port, e),
        }
    }

    if let Some(address) = config.ipv6() {
        match address.parse::<Ipv6Addr>() {
            Ok(group) => {
                let interfaces = eligible_interfaces(config)?;
                if interfaces.is_empty() {
                    debug!("No interface to receive {} on", group);
                } else {
                    match UdpEndpoint::listen_v6(group, config.port, &interfaces) {
                        Ok(endpoint) => endpoints.push(Arc::new(endpoint)),
                        Err(e) => debug!("Not listening on [{}]:{}: {}", group, config.port, e),
                    }
                }
            }
            Err(e) => debug!("Not listening on IPv6 address {}: {}", address, e),
        }
    }

    if endpoints.is_empty() {
        return Err(MulticastError::NoEndpoint);
    }

    info!("Listening on {} multicast endpoint(s)", endpoints.len());
    Ok(Multiplexer::new(endpoints))
}

async fn dial_v4(host: &str, port: u16) -> std::io::Result<UdpEndpoint> {
    let group = group_v4(host, port).await?;
    UdpEndpoint::dial(SocketAddr::from((group, port)), None).await
}

async fn group_v4(host: &str, port: u16) -> std::io::Result<Ipv4Addr> {
    tokio::net::lookup_host((host, port))
        .await?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("{} has no IPv4 address", host),
            )
        })
}

fn eligible_interfaces(config: &MulticastConfig) -> Result<Vec<InterfaceInfo>, MulticastError> {
    let interfaces = list_interfaces().map_err(MulticastError::Interfaces)?;

    Ok(interfaces
        .into_iter()
        .filter(|iface| {
            let keep = iface.is_multicast_capable() && config.allows_interface(&iface.name);
            if !keep {
                debug!("Ignoring interface {}", iface.name);
            }
            keep
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_only(address: &str) -> MulticastConfig {
        MulticastConfig {
            ipv4: Some(address.to_string()),
            ipv6: None,
            port: 54321,
            interfaces: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_invalid_config_dials_nothing() {
        let empty = MulticastConfig {
            ipv4: Some(String::new()),
            ipv6: Some(" ".to_string()),
            port: 54321,
            interfaces: Vec::new(),
        };
        assert!(matches!(
            resolve(&empty).await,
            Err(MulticastError::InvalidConfig(_))
        ));

        let no_port = MulticastConfig {
            port: 0,
            ..ipv4_only("127.0.0.1")
        };
        assert!(matches!(
            resolve(&no_port).await,
            Err(MulticastError::InvalidConfig(_))
        ));
        assert!(matches!(
            listen(&no_port).await,
            Err(MulticastError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_ipv4_yields_one_endpoint() {
        let endpoints = resolve(&ipv4_only("127.0.0.1")).await.unwrap();

        assert_eq!(endpoints.len(), 1);
        assert_eq!(
            endpoints[0].remote_addr(),
            "127.0.0.1:54321".parse::<SocketAddr>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_unknown_interfaces_leave_no_endpoint() {
        let config = MulticastConfig {
            ipv4: None,
            ipv6: Some("ff02::1".to_string()),
            port: 54321,
            interfaces: vec!["no-such-interface0".to_string()],
        };

        assert!(matches!(
            resolve(&config).await,
            Err(MulticastError::NoEndpoint)
        ));
        assert!(matches!(
            listen(&config).await,
            Err(MulticastError::NoEndpoint)
        ));
    }

    #[tokio::test]
    async fn test_unparsable_ipv6_is_skipped() {
        let config = MulticastConfig {
            ipv6: Some("not-an-address".to_string()),
            ..ipv4_only("127.0.0.1")
        };

        let endpoints = resolve(&config).await.unwrap();
        assert_eq!(endpoints.len(), 1);
    }

    #[tokio::test]
    async fn test_dial_wraps_endpoints() {
        let mux = dial(&ipv4_only("127.0.0.1")).await.unwrap();
        assert_eq!(mux.endpoints().len(), 1);
        assert!(!mux.is_started());
        mux.close().unwrap();
    }

    #[tokio::test]
    async fn test_listener_receives_datagrams() {
        let port = std::net::UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = MulticastConfig {
            port,
            ..ipv4_only("224.0.0.1")
        };

        let mux = listen(&config).await.unwrap();
        assert_eq!(mux.endpoints().len(), 1);
        mux.start();

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"hello", ("127.0.0.1", port)).await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), mux.read())
            .await
            .unwrap()
            .unwrap();
        assert!(event.is_readable());

        let mut buf = [0u8; 64];
        let (n, from) = event.endpoint.try_recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, sender.local_addr().unwrap());

        mux.close().unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a multicast route"]
    async fn test_default_ipv4_group() {
        let mux = dial(&ipv4_only("224.0.0.1")).await.unwrap();
        assert_eq!(mux.endpoints().len(), 1);
        assert!(mux.write(b"ping").await.unwrap() > 0);
        mux.close().unwrap();
    }
}
