//! Negotiated link capabilities

use crate::packet::{frame_len, DEFAULT_MAX_PAYLOAD};

/// Smallest ring buffer the transport will run with (4 MiB)
pub const MIN_RING_CAPACITY: usize = 4 * 1024 * 1024;

/// Capabilities agreed with the peer.
///
/// Only replaced as a whole, between exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Verify header and payload CRCs on receive
    pub crc_enabled: bool,
    /// Reject packets whose sequence number is not the expected one
    pub seq_enabled: bool,
    /// Answer ACK requests (and request ACKs ourselves)
    pub ack_enabled: bool,
    /// Largest payload a single packet may carry
    pub max_payload: u16,
}

impl Capabilities {
    pub fn new(crc_enabled: bool, seq_enabled: bool, ack_enabled: bool, max_payload: u16) -> Self {
        Capabilities {
            crc_enabled,
            seq_enabled,
            ack_enabled,
            max_payload,
        }
    }

    /// Ring buffer capacity: room for several maximal packets in flight,
    /// never below `MIN_RING_CAPACITY`
    pub fn ring_capacity(&self) -> usize {
        (4 * self.max_payload as usize).max(MIN_RING_CAPACITY)
    }

    /// Size of the largest possible frame on the wire
    pub fn max_frame_len(&self) -> usize {
        frame_len(self.max_payload as usize)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::new(true, true, true, DEFAULT_MAX_PAYLOAD)
    }
}
