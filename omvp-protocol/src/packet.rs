//! OMVP Packet Structures
//!
//! Every packet starts with a fixed 10-byte little-endian header. When the
//! header declares a non-zero length it is followed by the payload and a
//! 4-byte CRC32 of that payload.
//!
//! ```text
//! ┌───────────┬─────┬─────────┬───────┬────────┬────────┬────────────┐
//! │ sync_word │ seq │ channel │ flags │ opcode │ length │ header_crc │
//! │ 2 bytes   │ 1   │ 1       │ 1     │ 1      │ 2      │ 2          │
//! └───────────┴─────┴─────────┴───────┴────────┴────────┴────────────┘
//! ```

use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use thiserror::Error;

/// Size of the OMVP packet header in bytes
pub const HEADER_SIZE: usize = 10;

/// Number of header bytes covered by the header CRC16
pub const HEADER_CRC_SPAN: usize = 8;

/// Size of the trailing payload CRC32
pub const PAYLOAD_CRC_SIZE: usize = 4;

/// Sync word opening every packet (wire bytes `AA D5`)
pub const SYNC_WORD: u16 = 0xD5AA;

/// Reserved opcode used to (re)establish synchronization with a peer.
/// Packets carrying it are exempt from sequence validation.
pub const PROTO_SYNC: u8 = 0x00;

/// Default maximum payload size before capabilities are renegotiated
pub const DEFAULT_MAX_PAYLOAD: u16 = 4096;

/// Size on the wire of a packet carrying `length` payload bytes
#[inline]
pub fn frame_len(length: usize) -> usize {
    if length > 0 {
        HEADER_SIZE + length + PAYLOAD_CRC_SIZE
    } else {
        HEADER_SIZE
    }
}

/// Packet flags (bitset, combinable)
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    /// No flags set
    pub const NONE: Flags = Flags(0);
    /// Acknowledgement
    pub const ACK: Flags = Flags(1 << 0);
    /// Negative acknowledgement, payload carries a status code
    pub const NAK: Flags = Flags(1 << 1);
    /// Retransmission of a packet the peer believes was not acknowledged
    pub const RTX: Flags = Flags(1 << 2);
    /// Sender requests an acknowledgement
    pub const ACK_REQ: Flags = Flags(1 << 3);
    /// More fragments of the same message follow
    pub const FRAGMENT: Flags = Flags(1 << 4);
    /// Asynchronous notification, bypasses sequencing
    pub const EVENT: Flags = Flags(1 << 5);

    /// Build flags from the raw wire byte
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    /// Raw wire byte
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check whether every flag in `other` is set
    #[inline]
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 6] = [
            (Flags::ACK, "ACK"),
            (Flags::NAK, "NAK"),
            (Flags::RTX, "RTX"),
            (Flags::ACK_REQ, "ACK_REQ"),
            (Flags::FRAGMENT, "FRAGMENT"),
            (Flags::EVENT, "EVENT"),
        ];

        if self.is_empty() {
            return write!(f, "Flags(NONE)");
        }

        write!(f, "Flags(")?;
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        let unknown = self.0 & !0x3F;
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{:#04x}", unknown)?;
        }
        write!(f, ")")
    }
}

/// Decoded packet header (10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Sync word, `SYNC_WORD` on any packet worth looking at
    pub sync_word: u16,
    /// Sequence number (wraps at 256)
    pub sequence: SeqNumber,
    /// Logical channel
    pub channel: u8,
    /// Flag bitset
    pub flags: Flags,
    /// Command opcode
    pub opcode: u8,
    /// Payload length in bytes
    pub length: u16,
    /// CRC16 over the first 8 header bytes
    pub header_crc: u16,
}

impl Header {
    /// Create a header with the standard sync word and a zero CRC
    pub fn new(sequence: SeqNumber, channel: u8, flags: Flags, opcode: u8, length: u16) -> Self {
        Header {
            sync_word: SYNC_WORD,
            sequence,
            channel,
            flags,
            opcode,
            length,
            header_crc: 0,
        }
    }

    /// Decode the header fields from the first `HEADER_SIZE` bytes.
    ///
    /// Purely structural: sync word, length and CRC are not validated.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        Ok(Header {
            sync_word: buf.get_u16_le(),
            sequence: SeqNumber::new(buf.get_u8()),
            channel: buf.get_u8(),
            flags: Flags::from_bits(buf.get_u8()),
            opcode: buf.get_u8(),
            length: buf.get_u16_le(),
            header_crc: buf.get_u16_le(),
        })
    }

    /// Serialize the header to bytes (little-endian)
    pub fn to_bytes(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.sync_word);
        buf.put_u8(self.sequence.as_raw());
        buf.put_u8(self.channel);
        buf.put_u8(self.flags.bits());
        buf.put_u8(self.opcode);
        buf.put_u16_le(self.length);
        buf.put_u16_le(self.header_crc);
    }

    /// Total size of the frame this header announces
    #[inline]
    pub fn frame_len(&self) -> usize {
        frame_len(self.length as usize)
    }

    #[inline]
    pub fn is_event(&self) -> bool {
        self.flags.contains(Flags::EVENT)
    }

    #[inline]
    pub fn is_fragment(&self) -> bool {
        self.flags.contains(Flags::FRAGMENT)
    }

    #[inline]
    pub fn is_retransmission(&self) -> bool {
        self.flags.contains(Flags::RTX)
    }

    #[inline]
    pub fn is_nak(&self) -> bool {
        self.flags.contains(Flags::NAK)
    }

    #[inline]
    pub fn wants_ack(&self) -> bool {
        self.flags.contains(Flags::ACK_REQ)
    }
}

/// Validated packet handed out by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet header
    pub header: Header,
    /// Payload data (empty when `header.length == 0`)
    pub payload: Bytes,
    /// CRC32 of the payload, present only when the payload is non-empty
    pub payload_crc: Option<u32>,
}

impl Packet {
    #[inline]
    pub fn sequence(&self) -> SeqNumber {
        self.header.sequence
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.header.channel
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.header.flags
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.header.opcode
    }

    /// Total size of the packet on the wire
    pub fn size(&self) -> usize {
        self.header.frame_len()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq={} chan={} opcode={:#04x} {:?} len={}",
            self.header.sequence,
            self.header.channel,
            self.header.opcode,
            self.header.flags,
            self.header.length
        )
    }
}

/// Packet encoding and decoding errors
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        let flags = Flags::ACK | Flags::FRAGMENT;
        assert!(flags.contains(Flags::ACK));
        assert!(flags.contains(Flags::FRAGMENT));
        assert!(!flags.contains(Flags::EVENT));
        assert!(!flags.contains(Flags::ACK | Flags::EVENT));
        assert_eq!(flags.bits(), 0x11);
    }

    #[test]
    fn test_flags_insert_remove() {
        let mut flags = Flags::NONE;
        assert!(flags.is_empty());
        flags.insert(Flags::RTX);
        flags |= Flags::ACK_REQ;
        assert_eq!(flags, Flags::RTX | Flags::ACK_REQ);
        flags.remove(Flags::RTX);
        assert_eq!(flags, Flags::ACK_REQ);
    }

    #[test]
    fn test_flags_debug() {
        assert_eq!(format!("{:?}", Flags::NONE), "Flags(NONE)");
        assert_eq!(format!("{:?}", Flags::ACK | Flags::EVENT), "Flags(ACK | EVENT)");
    }

    #[test]
    fn test_header_layout() {
        let mut header = Header::new(SeqNumber::new(7), 3, Flags::ACK_REQ, 0x42, 0x0102);
        header.header_crc = 0xBEEF;

        let mut buf = BytesMut::new();
        header.to_bytes(&mut buf);

        assert_eq!(
            &buf[..],
            &[0xAA, 0xD5, 7, 3, 0x08, 0x42, 0x02, 0x01, 0xEF, 0xBE]
        );
    }

    #[test]
    fn test_header_roundtrip() {
        let mut header = Header::new(SeqNumber::new(255), 1, Flags::EVENT, 9, 12);
        header.header_crc = 0x1234;

        let mut buf = BytesMut::new();
        header.to_bytes(&mut buf);
        let decoded = Header::from_bytes(&buf).unwrap();

        assert_eq!(decoded, header);
        assert!(decoded.is_event());
        assert_eq!(decoded.frame_len(), HEADER_SIZE + 12 + PAYLOAD_CRC_SIZE);
    }

    #[test]
    fn test_header_insufficient_data() {
        let err = Header::from_bytes(&[0xAA, 0xD5, 0]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(frame_len(0), HEADER_SIZE);
        assert_eq!(frame_len(1), HEADER_SIZE + 1 + PAYLOAD_CRC_SIZE);
    }
}
