//! NAK status codes
//!
//! A NAK packet carries a 2-byte little-endian status code explaining why the
//! peer refused a request. Only a handful of codes change how the transport
//! reacts; everything else is carried through as `Status::Other`.

use bytes::Buf;
use std::fmt;

/// Raw wire values of the status codes the peer may report
pub mod code {
    pub const SUCCESS: u16 = 0x00;
    pub const FAILED: u16 = 0x01;
    pub const INVALID: u16 = 0x02;
    pub const TIMEOUT: u16 = 0x03;
    pub const BUSY: u16 = 0x04;
    pub const CHECKSUM: u16 = 0x05;
    pub const SEQUENCE: u16 = 0x06;
    pub const OVERFLOW: u16 = 0x07;
    pub const FRAGMENT: u16 = 0x08;
    pub const UNKNOWN: u16 = 0x09;
}

/// Status reported by the peer in a NAK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Peer saw a bad checksum on our packet
    Checksum,
    /// Peer saw an unexpected sequence number
    Sequence,
    /// Peer timed out waiting for the rest of a request
    Timeout,
    /// Peer is temporarily unable to service the request
    Busy,
    /// Any other status, carried as the raw wire value
    Other(u16),
}

impl Status {
    pub fn from_u16(value: u16) -> Self {
        match value {
            code::CHECKSUM => Status::Checksum,
            code::SEQUENCE => Status::Sequence,
            code::TIMEOUT => Status::Timeout,
            code::BUSY => Status::Busy,
            other => Status::Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Status::Checksum => code::CHECKSUM,
            Status::Sequence => code::SEQUENCE,
            Status::Timeout => code::TIMEOUT,
            Status::Busy => code::BUSY,
            Status::Other(value) => value,
        }
    }

    /// Decode the status from a NAK payload.
    ///
    /// Returns `None` when the payload is shorter than two bytes.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        if payload.len() < 2 {
            return None;
        }
        let mut buf = payload;
        Some(Status::from_u16(buf.get_u16_le()))
    }

    /// Encode the status as a NAK payload
    pub fn to_payload(self) -> [u8; 2] {
        self.as_u16().to_le_bytes()
    }

    /// Busy is the only status the caller is expected to simply retry
    #[inline]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Status::Busy)
    }

    /// Symbolic name of the status
    pub fn name(self) -> &'static str {
        match self.as_u16() {
            code::SUCCESS => "SUCCESS",
            code::FAILED => "FAILED",
            code::INVALID => "INVALID",
            code::TIMEOUT => "TIMEOUT",
            code::BUSY => "BUSY",
            code::CHECKSUM => "CHECKSUM",
            code::SEQUENCE => "SEQUENCE",
            code::OVERFLOW => "OVERFLOW",
            code::FRAGMENT => "FRAGMENT",
            code::UNKNOWN => "UNKNOWN",
            _ => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.name(), self.as_u16())
    }
}
