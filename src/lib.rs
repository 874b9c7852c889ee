//! Find My Device.
//!
//! Devices announce themselves on the local network by multicasting
//! compressed message streams over UDP. This crate ties the configuration,
//! the multicast transport and the wire format together for the `fmd` binary.

pub mod device;
pub mod receiver;
pub mod sender;
mod settings;

pub use receiver::{Received, SenderStreams};
pub use sender::DatagramWriter;
pub use settings::{GeneralOverrides, load_config, multicast_config};

pub use fmd_config::{Config, ConfigError};
pub use fmd_multicast::{Multiplexer, MulticastConfig, MulticastError};
pub use fmd_wire::{CodecError, Message, MessageCoder};

/// Version of fmd.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use fmd_config::AdvertiseConfig;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_advertisement_reaches_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = MulticastConfig {
            ipv4: Some("127.0.0.1".to_string()),
            ipv6: None,
            port: peer.local_addr().unwrap().port(),
            interfaces: Vec::new(),
        };

        let mux = fmd_multicast::dial(&config).await.unwrap();
        let mut coder = MessageCoder::encoder(Vec::new());

        let advertise = AdvertiseConfig {
            device_name: "desk1".to_string(),
            ..Default::default()
        };
        let message = Message::from(device::advertisement(&advertise));
        coder.write(&message).unwrap();
        let datagram = coder.take_output();
        assert_eq!(mux.write(&datagram).await.unwrap(), datagram.len());

        let mut buf = vec![0u8; 65536];
        let (n, _) = timeout(Duration::from_secs(5), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf.truncate(n);

        let mut decoder = MessageCoder::decoder(Cursor::new(buf));
        let decoded = decoder.read().unwrap().unwrap();
        let advertisement = decoded.as_device_advertisement().unwrap();
        assert_eq!(advertisement.device_name, "desk1");
        assert_eq!(advertisement.host_name, device::host_name());

        mux.close().unwrap();
        mux.close().unwrap();
    }
}
