//! Multicast transport errors.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Errors that can occur while opening or operating multicast endpoints.
#[derive(Debug, thiserror::Error)]
pub enum MulticastError {
    /// Missing or invalid addresses or port. Nothing was dialled.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Every dial attempt failed.
    #[error("unable to dial any multicast address")]
    NoEndpoint,
    /// The network interfaces could not be listed.
    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(#[source] io::Error),
    /// One or more endpoints failed during `write` or `close`.
    #[error(transparent)]
    Endpoints(#[from] EndpointErrors),
}

impl MulticastError {
    /// Per-endpoint failures carried by this error, if any.
    pub fn failures(&self) -> &[EndpointFailure] {
        match self {
            MulticastError::Endpoints(errors) => &errors.failures,
            _ => &[],
        }
    }
}

/// Failure of a single endpoint.
#[derive(Debug)]
pub struct EndpointFailure {
    /// Local address of the failing endpoint, if it could still be queried.
    pub local_addr: Option<SocketAddr>,
    /// Remote multicast address of the failing endpoint.
    pub remote_addr: SocketAddr,
    /// Underlying cause.
    pub error: io::Error,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_addr {
            Some(local) => write!(f, "{} -> {} - {}", local, self.remote_addr, self.error),
            None => write!(f, "? -> {} - {}", self.remote_addr, self.error),
        }
    }
}

impl std::error::Error for EndpointFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Aggregate of the failures of several endpoints. No failure is dropped.
#[derive(Debug, thiserror::Error)]
#[error("{}", join_failures(.failures))]
pub struct EndpointErrors {
    /// Failures in endpoint order.
    pub failures: Vec<EndpointFailure>,
    /// Smallest number of bytes written to any endpoint (0 for `close`).
    pub written: usize,
}

fn join_failures(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_names_every_endpoint() {
        let errors = EndpointErrors {
            failures: vec![
                EndpointFailure {
                    local_addr: Some("192.168.1.2:40000".parse().unwrap()),
                    remote_addr: "224.0.0.1:54321".parse().unwrap(),
                    error: io::Error::new(io::ErrorKind::Other, "first"),
                },
                EndpointFailure {
                    local_addr: None,
                    remote_addr: "[ff02::1]:54321".parse().unwrap(),
                    error: io::Error::new(io::ErrorKind::Other, "second"),
                },
            ],
            written: 0,
        };

        let text = MulticastError::from(errors).to_string();
        assert_eq!(
            text,
            "192.168.1.2:40000 -> 224.0.0.1:54321 - first; ? -> [ff02::1]:54321 - second"
        );
    }

    #[test]
    fn test_only_endpoints_carry_failures() {
        let errors = [
            MulticastError::InvalidConfig("no port".to_string()),
            MulticastError::NoEndpoint,
            MulticastError::Interfaces(io::Error::new(io::ErrorKind::Other, "getifaddrs")),
        ];

        for error in &errors {
            match error {
                MulticastError::InvalidConfig(_)
                | MulticastError::NoEndpoint
                | MulticastError::Interfaces(_)
                | MulticastError::Endpoints(_) => {}
            }
            assert!(error.failures().is_empty());
        }
    }
}
