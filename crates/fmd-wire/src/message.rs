//! Messages exchanged between fmd peers.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// A network message. Exactly one variant is carried per message.
///
/// Serialized as a single-key JSON object named after the variant, so a
/// message never transmits placeholders for the variants it does not carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Generic request from a client to a device.
    ClientRequest(ClientRequest),
    /// Short device announcement multicast on the local network.
    DeviceAdvertisement(DeviceAdvertisement),
    /// Detailed device information.
    DeviceInformation(DeviceInformation),
}

impl Message {
    /// Name of the active variant, as used for the JSON key.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Message::ClientRequest(_) => "ClientRequest",
            Message::DeviceAdvertisement(_) => "DeviceAdvertisement",
            Message::DeviceInformation(_) => "DeviceInformation",
        }
    }

    /// The client request, if this message carries one.
    pub fn as_client_request(&self) -> Option<&ClientRequest> {
        match self {
            Message::ClientRequest(request) => Some(request),
            _ => None,
        }
    }

    /// The device advertisement, if this message carries one.
    pub fn as_device_advertisement(&self) -> Option<&DeviceAdvertisement> {
        match self {
            Message::DeviceAdvertisement(advertisement) => Some(advertisement),
            _ => None,
        }
    }

    /// The device information, if this message carries one.
    pub fn as_device_information(&self) -> Option<&DeviceInformation> {
        match self {
            Message::DeviceInformation(information) => Some(information),
            _ => None,
        }
    }
}

impl From<ClientRequest> for Message {
    fn from(request: ClientRequest) -> Self {
        Message::ClientRequest(request)
    }
}

impl From<DeviceAdvertisement> for Message {
    fn from(advertisement: DeviceAdvertisement) -> Self {
        Message::DeviceAdvertisement(advertisement)
    }
}

impl From<DeviceInformation> for Message {
    fn from(information: DeviceInformation) -> Self {
        Message::DeviceInformation(information)
    }
}

/// Generic request from a client to a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ClientRequest {
    pub request: String,
    pub parameters: Vec<String>,
}

/// Local device advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DeviceAdvertisement {
    pub group: String,
    pub device_name: String,
    pub host_name: String,
}

/// Detailed device information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DeviceInformation {
    pub group: String,
    pub device_name: String,
    pub host_name: String,
    pub operating_system: String,
    pub network_interfaces: Vec<NetworkInterface>,
}

/// A network interface of a device together with its addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NetworkInterface {
    /// Operating system view of the interface. Its fields are inlined.
    #[serde(flatten)]
    pub interface: InterfaceDescriptor,
    pub addresses: Vec<NetworkAddress>,
    pub multicast: Vec<NetworkAddress>,
}

/// Operating system descriptor of a network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct InterfaceDescriptor {
    pub index: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_addr: Option<String>,
}

/// An address bound to a network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NetworkAddress {
    /// Address family / transport tag, e.g. `ip+net`.
    pub network: String,
    /// Textual address, e.g. `192.168.1.10/24`.
    pub address: String,
}

/// Decoding view of a message: every variant key is optional and unknown keys
/// are ignored, so malformed variant combinations can be reported without
/// losing the stream position.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(rename = "ClientRequest")]
    client_request: Option<ClientRequest>,
    #[serde(rename = "DeviceAdvertisement")]
    device_advertisement: Option<DeviceAdvertisement>,
    #[serde(rename = "DeviceInformation")]
    device_information: Option<DeviceInformation>,
}

impl TryFrom<WireMessage> for Message {
    type Error = CodecError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let mut variants: Vec<Message> = [
            wire.client_request.map(Message::from),
            wire.device_advertisement.map(Message::from),
            wire.device_information.map(Message::from),
        ]
        .into_iter()
        .flatten()
        .collect();

        match variants.len() {
            0 => Err(CodecError::EmptyMessage),
            1 => Ok(variants.remove(0)),
            n => Err(CodecError::MultipleVariants(n)),
        }
    }
}
