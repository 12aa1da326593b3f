//! Transport errors

use omvp_protocol::{BufferError, PacketError, Status};
use std::io;
use thiserror::Error;

/// Errors surfaced by the transport.
///
/// Local corruption never shows up here: the parser absorbs it and counts
/// it in the statistics. `Checksum` and `Sequence` are the *peer* reporting
/// trouble with our packets through a NAK.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Timed out waiting for a reply")]
    Timeout,

    #[error("Peer reported a checksum error")]
    Checksum,

    #[error("Peer reported a sequence error")]
    Sequence,

    #[error("Peer failed the request: {status}")]
    Protocol { status: Status },

    #[error("Malformed NAK: {len} byte payload")]
    MalformedNak { len: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Link error: {0}")]
    Link(#[from] io::Error),
}

impl TransportError {
    /// Map a NAK status to the error it raises.
    ///
    /// `Busy` is not an error and maps to `None`.
    pub fn from_status(status: Status) -> Option<Self> {
        if status.is_recoverable() {
            return None;
        }
        Some(match status {
            Status::Checksum => TransportError::Checksum,
            Status::Sequence => TransportError::Sequence,
            Status::Timeout => TransportError::Timeout,
            status => TransportError::Protocol { status },
        })
    }

    /// Whether simply repeating the exchange may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout | TransportError::Checksum | TransportError::Sequence
        )
    }
}
