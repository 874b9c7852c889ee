//! Default values.

/// Default IPv4 multicast address (all hosts on this subnet).
pub const DEFAULT_MULTICAST_IP4: &str = "224.0.0.1";

/// Default IPv6 multicast address (link-local all nodes).
pub const DEFAULT_MULTICAST_IP6: &str = "ff02::1";

/// Default UDP port for local network communication.
pub const DEFAULT_PORT: u16 = 54321;

/// Default number of seconds between two advertisements.
pub const DEFAULT_ADVERTISE_INTERVAL: u64 = 15;
