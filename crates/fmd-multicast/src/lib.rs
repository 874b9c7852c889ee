//! Multicast transport for fmd.
//!
//! Opens one UDP endpoint per usable (multicast address, interface) pair and
//! exposes the whole set as a single fan-out / fan-in channel, the
//! [`Multiplexer`].

mod config;
mod endpoint;
mod error;
mod interfaces;
mod multiplexer;
mod resolver;

pub use config::MulticastConfig;
pub use endpoint::{Endpoint, UdpEndpoint};
pub use error::{EndpointErrors, EndpointFailure, MulticastError};
pub use interfaces::{InterfaceInfo, list_interfaces};
pub use multiplexer::{Multiplexer, POLL_INTERVAL, ReadEvent};
pub use resolver::{dial, listen, resolve};
