//! Compressed message stream encoder/decoder.

use std::io::{self, BufReader, Read, Write};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use serde_json::StreamDeserializer;
use serde_json::de::IoRead;
use tracing::trace;

use crate::CodecResult;
use crate::error::CodecError;
use crate::message::{Message, WireMessage};

type JsonStream<R> = StreamDeserializer<'static, IoRead<BufReader<MultiGzDecoder<R>>>, WireMessage>;

/// Encode a message as the minimal JSON object sent on the wire.
///
/// The object has exactly one key, the name of the active variant.
pub fn encode_object(message: &Message) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(message).map_err(CodecError::Encode)
}

/// Reads and writes messages as one continuous gzip-compressed stream.
///
/// Each side keeps its compression context for the lifetime of the coder, so
/// many messages share one gzip stream instead of being compressed one by one.
/// The write side is single-writer: concurrent producers must serialize their
/// calls.
pub struct MessageCoder<R: Read, W: Write> {
    decoder: Option<JsonStream<R>>,
    encoder: Option<GzEncoder<W>>,
    closed: bool,
}

impl<R: Read, W: Write> MessageCoder<R, W> {
    /// Create a coder decoding from `reader` and/or encoding to `writer`.
    ///
    /// A missing side disables the matching operation. Nothing is read or
    /// written until the first `read` or `write`.
    pub fn new(reader: Option<R>, writer: Option<W>) -> Self {
        let decoder = reader.map(|reader| {
            let gzip = BufReader::new(MultiGzDecoder::new(reader));
            serde_json::Deserializer::from_reader(gzip).into_iter::<WireMessage>()
        });
        let encoder = writer.map(|writer| GzEncoder::new(writer, Compression::default()));

        Self {
            decoder,
            encoder,
            closed: false,
        }
    }

    /// Append a message to the output stream.
    ///
    /// The compressor is sync-flushed afterwards, so everything written so far
    /// can be decoded by the peer without waiting for more messages.
    pub fn write(&mut self, message: &Message) -> CodecResult<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or(CodecError::Unsupported("writer"))?;

        if self.closed {
            return Err(CodecError::Closed);
        }

        let object = encode_object(message)?;
        encoder.write_all(&object)?;
        encoder.flush()?;

        trace!(
            variant = message.variant_name(),
            len = object.len(),
            "Encoded message"
        );
        Ok(())
    }

    /// Decode the next message of the input stream.
    ///
    /// Returns `Ok(None)` once the stream has ended. After a
    /// [`CodecError::Decode`] the stream position is lost and further reads
    /// are meaningless. Objects with zero or several variants are reported as
    /// errors but the following messages can still be read.
    pub fn read(&mut self) -> CodecResult<Option<Message>> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or(CodecError::Unsupported("reader"))?;

        match decoder.next() {
            None => Ok(None),
            Some(Ok(wire)) => Message::try_from(wire).map(Some),
            Some(Err(e)) => Err(CodecError::Decode(e)),
        }
    }

    /// End the current gzip member and begin a new one on the same writer.
    ///
    /// The trailer is written now, the next member's header with the next
    /// message. A reader joining the stream late can start decoding at any
    /// member header. If finishing fails the writer is lost and the coder
    /// is closed.
    pub fn restart(&mut self) -> CodecResult<()> {
        let encoder = self
            .encoder
            .take()
            .ok_or(CodecError::Unsupported("writer"))?;

        if self.closed {
            self.encoder = Some(encoder);
            return Err(CodecError::Closed);
        }

        match encoder.finish() {
            Ok(writer) => {
                self.encoder = Some(GzEncoder::new(writer, Compression::default()));
                trace!("Started new gzip member");
                Ok(())
            }
            Err(e) => {
                self.closed = true;
                Err(e.into())
            }
        }
    }

    /// Whether the coder can decode messages.
    pub fn can_read(&self) -> bool {
        self.decoder.is_some()
    }

    /// Whether the coder can encode messages.
    pub fn can_write(&self) -> bool {
        self.encoder.is_some() && !self.closed
    }

    /// Finish the output stream and release the input stream.
    ///
    /// Writes the gzip trailer to the writer. Calling `close` again is a no-op.
    pub fn close(&mut self) -> CodecResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.decoder = None;

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.try_finish()?;
            encoder.get_mut().flush()?;
        }

        Ok(())
    }
}

impl<R: Read> MessageCoder<R, io::Sink> {
    /// Create a decode-only coder.
    pub fn decoder(reader: R) -> Self {
        Self::new(Some(reader), None)
    }
}

impl<W: Write> MessageCoder<io::Empty, W> {
    /// Create an encode-only coder.
    pub fn encoder(writer: W) -> Self {
        Self::new(None, Some(writer))
    }
}

impl<R: Read> MessageCoder<R, Vec<u8>> {
    /// Drain the compressed bytes produced so far.
    ///
    /// Used to hand each encoded message to a datagram transport.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.encoder
            .as_mut()
            .map(|encoder| std::mem::take(encoder.get_mut()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::message::{
        ClientRequest, DeviceAdvertisement, DeviceInformation, InterfaceDescriptor,
        NetworkAddress, NetworkInterface,
    };

    fn advertisement(name: &str) -> Message {
        Message::from(DeviceAdvertisement {
            group: String::new(),
            device_name: name.to_string(),
            host_name: name.to_string(),
        })
    }

    fn information() -> Message {
        Message::from(DeviceInformation {
            group: "lab".to_string(),
            device_name: "desk1".to_string(),
            host_name: "desk1.local".to_string(),
            operating_system: "linux".to_string(),
            network_interfaces: vec![NetworkInterface {
                interface: InterfaceDescriptor {
                    index: 2,
                    name: "eth0".to_string(),
                    hardware_addr: Some("00:11:22:33:44:55".to_string()),
                },
                addresses: vec![NetworkAddress {
                    network: "ip+net".to_string(),
                    address: "fe80::1/64".to_string(),
                }],
                multicast: vec![NetworkAddress {
                    network: "ip".to_string(),
                    address: "ff02::1".to_string(),
                }],
            }],
        })
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_sparse_object_has_single_key() {
        let object = encode_object(&advertisement("desk1")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&object).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();

        assert_eq!(keys, vec!["DeviceAdvertisement"]);
        assert!(!String::from_utf8(object).unwrap().contains("null"));
    }

    #[test]
    fn test_stream_roundtrip() {
        let messages = vec![
            Message::from(ClientRequest {
                request: "find".to_string(),
                parameters: vec!["desk1".to_string(), "desk2".to_string()],
            }),
            advertisement("desk1"),
            information(),
        ];

        let mut writer = MessageCoder::encoder(Vec::new());
        for message in &messages {
            writer.write(message).unwrap();
        }
        writer.close().unwrap();
        let bytes = writer.take_output();

        let mut reader = MessageCoder::decoder(Cursor::new(bytes));
        for expected in &messages {
            assert_eq!(reader.read().unwrap().as_ref(), Some(expected));
        }
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_one_continuous_stream() {
        let mut writer = MessageCoder::encoder(Vec::new());

        writer.write(&advertisement("desk1")).unwrap();
        let first = writer.take_output();
        writer.write(&advertisement("desk2")).unwrap();
        let second = writer.take_output();

        // Only the first chunk carries the gzip header.
        assert_eq!(&first[..2], &[0x1f, 0x8b]);
        assert!(!second.is_empty());
        assert_ne!(&second[..2], &[0x1f, 0x8b]);

        // Every flushed prefix is decodable on its own.
        let mut reader = MessageCoder::decoder(Cursor::new(first.clone()));
        assert_eq!(reader.read().unwrap(), Some(advertisement("desk1")));

        let mut stream = first;
        stream.extend_from_slice(&second);
        let mut reader = MessageCoder::decoder(Cursor::new(stream));
        assert_eq!(reader.read().unwrap(), Some(advertisement("desk1")));
        assert_eq!(reader.read().unwrap(), Some(advertisement("desk2")));
    }

    #[test]
    fn test_restart_begins_new_member() {
        let mut writer = MessageCoder::encoder(Vec::new());

        writer.write(&advertisement("desk1")).unwrap();
        writer.restart().unwrap();
        let first = writer.take_output();
        writer.write(&advertisement("desk2")).unwrap();
        let second = writer.take_output();

        // The second member is decodable on its own.
        assert_eq!(&second[..3], &[0x1f, 0x8b, 0x08]);
        let mut late = MessageCoder::decoder(Cursor::new(second.clone()));
        assert_eq!(late.read().unwrap(), Some(advertisement("desk2")));

        // And the whole stream still reads as one.
        let mut stream = first;
        stream.extend_from_slice(&second);
        let mut reader = MessageCoder::decoder(Cursor::new(stream));
        assert_eq!(reader.read().unwrap(), Some(advertisement("desk1")));
        assert_eq!(reader.read().unwrap(), Some(advertisement("desk2")));

        writer.close().unwrap();
        assert!(matches!(writer.restart(), Err(CodecError::Closed)));
    }

    #[test]
    fn test_unsupported_operations() {
        let mut writer = MessageCoder::encoder(Vec::new());
        assert!(matches!(
            writer.read(),
            Err(CodecError::Unsupported("reader"))
        ));
        assert!(!writer.can_read());

        let mut reader = MessageCoder::decoder(Cursor::new(Vec::new()));
        assert!(matches!(
            reader.write(&advertisement("desk1")),
            Err(CodecError::Unsupported("writer"))
        ));
        assert!(!reader.can_write());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut writer = MessageCoder::encoder(Vec::new());
        writer.write(&advertisement("desk1")).unwrap();
        writer.close().unwrap();
        let len = writer.take_output().len();
        assert!(len > 0);

        writer.close().unwrap();
        assert!(writer.take_output().is_empty());
        assert!(matches!(
            writer.write(&advertisement("desk1")),
            Err(CodecError::Closed)
        ));
    }

    #[test]
    fn test_invalid_variant_combinations_keep_stream_position() {
        let bytes = gzip(
            br#"{"ClientRequest":{},"DeviceAdvertisement":{}}{}{"DeviceAdvertisement":{"DeviceName":"desk1","HostName":"desk1"}}"#,
        );
        let mut reader = MessageCoder::decoder(Cursor::new(bytes));

        assert!(matches!(
            reader.read(),
            Err(CodecError::MultipleVariants(2))
        ));
        assert!(matches!(reader.read(), Err(CodecError::EmptyMessage)));
        assert_eq!(reader.read().unwrap(), Some(advertisement("desk1")));
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let mut reader = MessageCoder::decoder(Cursor::new(b"definitely not gzip".to_vec()));
        assert!(matches!(reader.read(), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_malformed_json_is_a_decode_error() {
        let bytes = gzip(br#"{"DeviceAdvertisement":{"DeviceName":"#);
        let mut reader = MessageCoder::decoder(Cursor::new(bytes));
        assert!(matches!(reader.read(), Err(CodecError::Decode(_))));
    }
}
