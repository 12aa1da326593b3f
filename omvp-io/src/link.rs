//! Byte link abstraction
//!
//! The transport only needs three things from the physical link: how many
//! bytes are waiting, a way to read them, and a way to write one whole frame
//! at a time. Serial ports, UDP sockets and in-process pipes all fit.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::collections::VecDeque;
use std::io::{self, ErrorKind};

/// Byte source/sink the transport runs over
pub trait Link {
    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes, returning how many were read
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write one complete frame. Frames are never split across calls.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

impl<L: Link + ?Sized> Link for &mut L {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).write_frame(frame)
    }
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).write_frame(frame)
    }
}

/// One end of an in-process link.
///
/// Each `write_frame` on one end becomes readable on the other end. Bytes
/// are delivered exactly as written, so tests can write partial or corrupt
/// frames through it.
pub struct MemoryLink {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    /// Received bytes not yet read
    pending: VecDeque<u8>,
    /// Peer end has been dropped
    closed: bool,
}

impl MemoryLink {
    /// Create two connected ends
    pub fn pair() -> (MemoryLink, MemoryLink) {
        let (a_tx, b_rx) = channel::unbounded();
        let (b_tx, a_rx) = channel::unbounded();

        (MemoryLink::new(a_tx, a_rx), MemoryLink::new(b_tx, b_rx))
    }

    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        MemoryLink {
            tx,
            rx,
            pending: VecDeque::new(),
            closed: false,
        }
    }

    /// Move everything sent by the peer into `pending`
    fn fill(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    /// Read everything currently available (test convenience)
    pub fn read_all(&mut self) -> Vec<u8> {
        self.fill();
        self.pending.drain(..).collect()
    }
}

impl Link for MemoryLink {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.fill();
        if self.pending.is_empty() && self.closed {
            return Err(io::Error::new(ErrorKind::NotConnected, "peer disconnected"));
        }
        Ok(self.pending.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill();
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.tx
            .send(frame.to_vec())
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "peer disconnected"))
    }
}
