//! Bridge from received datagrams to a blocking byte stream.

use std::io::{self, Read};

use tokio::sync::mpsc;

/// Blocking reader over datagrams delivered through a tokio channel.
///
/// Datagrams are concatenated in arrival order. The reader reports end of
/// stream once every sender is dropped and all queued datagrams are consumed.
/// `read` blocks the current thread, so the reader must live on a blocking
/// task (`tokio::task::spawn_blocking`) or a plain thread.
#[derive(Debug)]
pub struct DatagramReader {
    rx: mpsc::Receiver<Vec<u8>>,
    current: Vec<u8>,
    pos: usize,
}

impl DatagramReader {
    /// Create a reader consuming `rx`.
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            current: Vec::new(),
            pos: 0,
        }
    }

    /// Create a reader together with the sender feeding it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

impl Read for DatagramReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos >= self.current.len() {
            match self.rx.blocking_recv() {
                Some(datagram) => {
                    self.current = datagram;
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.current.len() - self.pos);
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
