//! Wire format for fmd.
//!
//! Messages travel as one continuous gzip stream per sender. Inside the
//! decompressed stream every message is a minimal JSON object whose only key
//! is the name of the active message variant, e.g.
//! `{"DeviceAdvertisement":{"Group":"","DeviceName":"desk1","HostName":"desk1"}}`.

mod coder;
mod datagram;
mod error;
mod message;

pub use coder::{MessageCoder, encode_object};
pub use datagram::DatagramReader;
pub use error::CodecError;
pub use message::{
    ClientRequest, DeviceAdvertisement, DeviceInformation, InterfaceDescriptor, Message,
    NetworkAddress, NetworkInterface,
};

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
