//! Per-sender message streams on the receiving side.
//!
//! Every sender writes one continuous compressed stream, split into
//! datagrams. Datagrams are grouped by source address and each group is
//! decoded by its own [`MessageCoder`] on a blocking task.
//!
//! A decoder is only started on a datagram that begins a gzip member. Senders
//! start a new member every few messages, so a receiver that joins late, falls
//! behind or hits a corrupt datagram picks the stream up again at the next
//! member.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use fmd_wire::{CodecError, DatagramReader, Message, MessageCoder};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Magic bytes and compression method that open every gzip member.
const GZIP_HEADER: [u8; 3] = [0x1f, 0x8b, 0x08];

const DATAGRAM_QUEUE: usize = 256;

/// Upper bound on concurrently decoded senders. Each one holds a blocking thread.
const MAX_SENDERS: usize = 128;

/// A decoded message and the address it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub sender: SocketAddr,
    pub message: Message,
}

struct Stream {
    tx: mpsc::Sender<Vec<u8>>,
    last_seen: Instant,
}

/// Routes datagrams to one decoder per sender.
pub struct SenderStreams {
    streams: HashMap<SocketAddr, Stream>,
    decoders: JoinSet<()>,
    messages: mpsc::UnboundedSender<Received>,
}

impl SenderStreams {
    /// Create an empty table and the channel decoded messages are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Received>) {
        let (messages, rx) = mpsc::unbounded_channel();

        (
            Self {
                streams: HashMap::new(),
                decoders: JoinSet::new(),
                messages,
            },
            rx,
        )
    }

    /// Append a datagram to the stream of `sender`. Never waits.
    ///
    /// Senders without a live decoder get one when the datagram begins a gzip
    /// member; anything else from them is dropped. If the decoder of a sender
    /// cannot keep up, its stream is closed and picked up again at the next
    /// member. Must be called from within a tokio runtime.
    pub fn push(&mut self, sender: SocketAddr, datagram: Vec<u8>) {
        if self.streams.get(&sender).is_some_and(|s| s.tx.is_closed()) {
            debug!(%sender, "Decoder exited, waiting for the next member");
            self.streams.remove(&sender);
        }

        if !self.streams.contains_key(&sender) {
            if !datagram.starts_with(&GZIP_HEADER) {
                trace!(%sender, "Dropping datagram outside of a known stream");
                return;
            }
            if self.streams.len() >= MAX_SENDERS {
                warn!(%sender, "Too many senders, dropping datagram");
                return;
            }
            self.spawn_decoder(sender);
        }

        let Some(stream) = self.streams.get_mut(&sender) else {
            return;
        };
        stream.last_seen = Instant::now();

        match stream.tx.try_send(datagram) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(%sender, "Decoder is falling behind, dropping stream");
                self.streams.remove(&sender);
            }
            Err(TrySendError::Closed(_)) => {
                self.streams.remove(&sender);
            }
        }
    }

    /// Close the streams of senders that sent nothing for `idle`. Their
    /// decoders see the end of the stream and exit.
    ///
    /// Returns the number of evicted senders.
    pub fn evict_idle(&mut self, idle: Duration) -> usize {
        let before = self.streams.len();
        self.streams.retain(|sender, stream| {
            let keep = stream.last_seen.elapsed() < idle;
            if !keep {
                debug!(%sender, "Evicting idle sender");
            }
            keep
        });
        self.reap();

        before - self.streams.len()
    }

    /// Number of decoder tasks that have not finished yet.
    pub fn decoders(&mut self) -> usize {
        self.reap();
        self.decoders.len()
    }

    /// Number of senders with a stream.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn spawn_decoder(&mut self, sender: SocketAddr) {
        debug!(%sender, "New stream");
        let (tx, reader) = DatagramReader::channel(DATAGRAM_QUEUE);
        let messages = self.messages.clone();

        self.decoders
            .spawn_blocking(move || decode_stream(sender, reader, messages));
        self.streams.insert(
            sender,
            Stream {
                tx,
                last_seen: Instant::now(),
            },
        );
    }

    fn reap(&mut self) {
        while let Some(result) = self.decoders.try_join_next() {
            if let Err(e) = result {
                warn!("Decoder task failed: {}", e);
            }
        }
    }
}

fn decode_stream(
    sender: SocketAddr,
    reader: DatagramReader,
    messages: mpsc::UnboundedSender<Received>,
) {
    let mut coder = MessageCoder::decoder(reader);

    loop {
        match coder.read() {
            Ok(Some(message)) => {
                trace!(%sender, variant = message.variant_name(), "Decoded message");
                if messages.send(Received { sender, message }).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!(%sender, "Stream ended");
                break;
            }
            Err(e @ (CodecError::EmptyMessage | CodecError::MultipleVariants(_))) => {
                warn!(%sender, "Ignoring message: {}", e);
            }
            // The compressed stream ended early or is corrupt.
            Err(CodecError::Decode(e)) if e.is_io() => {
                debug!(%sender, "Stream closed: {}", e);
                break;
            }
            Err(e) => {
                warn!(%sender, "Dropping stream: {}", e);
                break;
            }
        }
    }
}
