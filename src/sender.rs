//! Datagram payloads for an outgoing message stream.

use std::io;

use fmd_wire::{CodecResult, Message, MessageCoder};

/// Messages per gzip member. Receivers that missed the start of a stream can
/// pick it up at the next member.
pub const MESSAGES_PER_MEMBER: usize = 4;

/// Encodes messages into datagram payloads of one continuous gzip stream,
/// starting a new gzip member every few messages.
pub struct DatagramWriter {
    coder: MessageCoder<io::Empty, Vec<u8>>,
    per_member: usize,
    in_member: usize,
}

impl DatagramWriter {
    pub fn new() -> Self {
        Self::with_member_size(MESSAGES_PER_MEMBER)
    }

    pub fn with_member_size(per_member: usize) -> Self {
        Self {
            coder: MessageCoder::encoder(Vec::new()),
            per_member: per_member.max(1),
            in_member: 0,
        }
    }

    /// Encode one message into the payload of one datagram.
    ///
    /// The payload that completes a member also carries its trailer, so the
    /// next payload begins with a gzip header.
    pub fn encode(&mut self, message: &Message) -> CodecResult<Vec<u8>> {
        self.coder.write(message)?;
        self.in_member += 1;

        if self.in_member >= self.per_member {
            self.coder.restart()?;
            self.in_member = 0;
        }

        Ok(self.coder.take_output())
    }

    /// Finish the stream. Returns the remaining bytes to send.
    pub fn finish(&mut self) -> CodecResult<Vec<u8>> {
        self.coder.close()?;
        Ok(self.coder.take_output())
    }
}

impl Default for DatagramWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use fmd_wire::DeviceAdvertisement;

    use super::*;

    fn advertisement(name: &str) -> Message {
        Message::from(DeviceAdvertisement {
            group: String::new(),
            device_name: name.to_string(),
            host_name: name.to_string(),
        })
    }

    #[test]
    fn test_members_restart_on_schedule() {
        let mut writer = DatagramWriter::with_member_size(2);
        let payloads: Vec<Vec<u8>> = (0..5)
            .map(|i| writer.encode(&advertisement(&format!("desk{i}"))).unwrap())
            .collect();

        let starts: Vec<bool> = payloads
            .iter()
            .map(|p| p.starts_with(&[0x1f, 0x8b, 0x08]))
            .collect();
        assert_eq!(starts, vec![true, false, true, false, true]);

        let mut stream: Vec<u8> = payloads.concat();
        stream.extend(writer.finish().unwrap());

        let mut reader = MessageCoder::decoder(Cursor::new(stream));
        for i in 0..5 {
            assert_eq!(
                reader.read().unwrap(),
                Some(advertisement(&format!("desk{i}")))
            );
        }
        assert!(reader.read().unwrap().is_none());
    }
}
