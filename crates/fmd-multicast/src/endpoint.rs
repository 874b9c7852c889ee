//! Datagram endpoints.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::interfaces::InterfaceInfo;

/// One opened datagram endpoint owned by a [`Multiplexer`](crate::Multiplexer).
#[async_trait]
pub trait Endpoint: fmt::Debug + Send + Sync {
    /// Local address of the socket.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote multicast address datagrams are sent to.
    fn remote_addr(&self) -> SocketAddr;

    /// Interface the endpoint is scoped to, if any.
    fn interface(&self) -> Option<&str>;

    /// Send one datagram. Returns the number of bytes sent.
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Wait until a datagram may be received. Readiness can be spurious.
    async fn readable(&self) -> io::Result<()>;

    /// Take the pending socket error, if any. Readiness is also signalled for
    /// errors, so this is checked before reporting a readable endpoint.
    fn take_error(&self) -> io::Result<Option<io::Error>>;

    /// Receive a datagram without waiting. Fails with `WouldBlock` if none is queued.
    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Close the endpoint. Further operations fail.
    fn close(&self) -> io::Result<()>;
}

/// A UDP socket sending to one multicast group.
///
/// Dialled endpoints are connected to the group and pinned to one interface
/// for IPv6. Listening endpoints are bound to the group port and joined to the
/// group instead.
pub struct UdpEndpoint {
    socket: RwLock<Option<Arc<UdpSocket>>>,
    remote: SocketAddr,
    interface: Option<String>,
    connected: bool,
}

impl UdpEndpoint {
    /// Open a socket connected to `remote`.
    ///
    /// For IPv6 the scope id of `remote` selects the outgoing interface.
    pub async fn dial(remote: SocketAddr, interface: Option<String>) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(remote), Type::DGRAM, Some(Protocol::UDP))?;

        match remote {
            SocketAddr::V4(_) => {
                socket.set_multicast_loop_v4(true)?;
                let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
                socket.bind(&SockAddr::from(local))?;
            }
            SocketAddr::V6(v6) => {
                socket.set_multicast_loop_v6(true)?;
                if v6.scope_id() != 0 {
                    socket.set_multicast_if_v6(v6.scope_id())?;
                }
                let local = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0);
                socket.bind(&SockAddr::from(local))?;
            }
        }

        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;
        socket.connect(remote).await?;

        Ok(Self::from_socket(socket, remote, interface, true))
    }

    /// Open a socket bound to `port` on all IPv4 addresses and joined to `group`.
    pub fn listen_v4(group: Ipv4Addr, port: u16) -> io::Result<Self> {
        let socket = Self::reusable_socket(Domain::IPV4)?;
        socket.bind(&SockAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))?;

        if let Err(e) = socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED) {
            warn!("Failed to join multicast group {}: {}", group, e);
        }

        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;
        let remote = SocketAddr::V4(SocketAddrV4::new(group, port));

        Ok(Self::from_socket(socket, remote, None, false))
    }

    /// Open a socket bound to `port` on all IPv6 addresses and joined to
    /// `group` on every given interface.
    pub fn listen_v6(group: Ipv6Addr, port: u16, interfaces: &[InterfaceInfo]) -> io::Result<Self> {
        let socket = Self::reusable_socket(Domain::IPV6)?;
        socket.set_only_v6(true)?;
        socket.bind(&SockAddr::from(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0)))?;

        for iface in interfaces {
            match socket.join_multicast_v6(&group, iface.index) {
                Ok(()) => debug!("Joined multicast group {} on {}", group, iface.name),
                Err(e) => warn!(
                    "Failed to join multicast group {} on {}: {}",
                    group, iface.name, e
                ),
            }
        }

        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;
        let remote = SocketAddr::V6(SocketAddrV6::new(group, port, 0, 0));

        Ok(Self::from_socket(socket, remote, None, false))
    }

    fn reusable_socket(domain: Domain) -> io::Result<Socket> {
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;

        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;

        Ok(socket)
    }

    fn from_socket(
        socket: UdpSocket,
        remote: SocketAddr,
        interface: Option<String>,
        connected: bool,
    ) -> Self {
        Self {
            socket: RwLock::new(Some(Arc::new(socket))),
            remote,
            interface,
            connected,
        }
    }

    fn socket(&self) -> io::Result<Arc<UdpSocket>> {
        self.socket.read().clone().ok_or_else(closed)
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "endpoint closed")
}

impl fmt::Debug for UdpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpEndpoint")
            .field("local", &self.local_addr().ok())
            .field("remote", &self.remote)
            .field("interface", &self.interface)
            .field("connected", &self.connected)
            .finish()
    }
}

#[async_trait]
impl Endpoint for UdpEndpoint {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket()?.local_addr()
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let socket = self.socket()?;
        if self.connected {
            socket.send(buf).await
        } else {
            socket.send_to(buf, self.remote).await
        }
    }

    async fn readable(&self) -> io::Result<()> {
        self.socket()?.readable().await
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.socket()?.take_error()
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket()?.try_recv_from(buf)
    }

    fn close(&self) -> io::Result<()> {
        match self.socket.write().take() {
            Some(_) => Ok(()),
            None => Err(closed()),
        }
    }
}
