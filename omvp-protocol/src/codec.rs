//! Frame encoding and decoding
//!
//! `FrameCodec` turns header fields and a payload into wire bytes and back.
//! Decoding is purely structural; CRC validation is a separate step so the
//! parser can decide what a failure means.

use crate::crc::CrcSuite;
use crate::packet::{
    frame_len, Flags, Header, Packet, PacketError, HEADER_CRC_SPAN, HEADER_SIZE, PAYLOAD_CRC_SIZE,
};
use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Encoder/decoder for OMVP frames
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    crc: CrcSuite,
}

impl FrameCodec {
    /// Create a codec using the given checksum functions
    pub fn new(crc: CrcSuite) -> Self {
        FrameCodec { crc }
    }

    /// Checksum functions in use
    pub fn crc(&self) -> CrcSuite {
        self.crc
    }

    /// Encode a complete frame.
    ///
    /// The header CRC and (for non-empty payloads) the payload CRC are always
    /// generated, whether or not the receiving side checks them.
    pub fn encode(
        &self,
        sequence: SeqNumber,
        channel: u8,
        flags: Flags,
        opcode: u8,
        payload: &[u8],
    ) -> Result<BytesMut, PacketError> {
        let mut buf = BytesMut::with_capacity(frame_len(payload.len()));
        self.encode_into(sequence, channel, flags, opcode, payload, &mut buf)?;
        Ok(buf)
    }

    /// Encode a complete frame at the end of `buf`
    pub fn encode_into(
        &self,
        sequence: SeqNumber,
        channel: u8,
        flags: Flags,
        opcode: u8,
        payload: &[u8],
        buf: &mut BytesMut,
    ) -> Result<(), PacketError> {
        let length = u16::try_from(payload.len()).map_err(|_| PacketError::PayloadTooLarge {
            size: payload.len(),
            max: u16::MAX as usize,
        })?;

        buf.reserve(frame_len(payload.len()));
        let start = buf.len();

        Header::new(sequence, channel, flags, opcode, length).to_bytes(buf);
        let header_crc = self.header_crc(&buf[start..]);
        buf[start + HEADER_CRC_SPAN..start + HEADER_SIZE].copy_from_slice(&header_crc.to_le_bytes());

        if !payload.is_empty() {
            buf.put_slice(payload);
            buf.put_u32_le(self.crc.payload(payload));
        }

        Ok(())
    }

    /// Decode the header fields of a frame (no validation)
    #[inline]
    pub fn decode_header(&self, bytes: &[u8]) -> Result<Header, PacketError> {
        Header::from_bytes(bytes)
    }

    /// Decode a complete frame (no validation).
    ///
    /// `bytes` must hold at least the full frame announced by its header.
    pub fn decode(&self, bytes: &[u8]) -> Result<Packet, PacketError> {
        let header = self.decode_header(bytes)?;
        let total = header.frame_len();
        if bytes.len() < total {
            return Err(PacketError::InsufficientData {
                expected: total,
                actual: bytes.len(),
            });
        }

        Ok(split_frame(header, Bytes::copy_from_slice(&bytes[..total])))
    }

    /// CRC16 over the first `HEADER_CRC_SPAN` bytes of a header
    #[inline]
    pub fn header_crc(&self, header_bytes: &[u8]) -> u16 {
        self.crc.header(&header_bytes[..HEADER_CRC_SPAN])
    }

    /// Check a decoded header against the raw bytes it came from
    pub fn check_header(&self, header_bytes: &[u8], header: &Header, crc_enabled: bool) -> bool {
        !crc_enabled || self.header_crc(header_bytes) == header.header_crc
    }

    /// Check a payload against its trailing CRC32
    pub fn check_payload(&self, payload: &[u8], expected: u32, crc_enabled: bool) -> bool {
        !crc_enabled || self.crc.payload(payload) == expected
    }
}

/// Split a complete frame into a packet without copying the payload
pub(crate) fn split_frame(header: Header, frame: Bytes) -> Packet {
    if header.length == 0 {
        return Packet {
            header,
            payload: Bytes::new(),
            payload_crc: None,
        };
    }

    let payload_end = HEADER_SIZE + header.length as usize;
    let mut crc_bytes = &frame[payload_end..payload_end + PAYLOAD_CRC_SIZE];
    let payload_crc = crc_bytes.get_u32_le();

    Packet {
        header,
        payload: frame.slice(HEADER_SIZE..payload_end),
        payload_crc: Some(payload_crc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc;

    #[test]
    fn test_encode_empty_payload() {
        let codec = FrameCodec::default();
        let frame = codec
            .encode(SeqNumber::new(1), 2, Flags::ACK, 0x10, &[])
            .unwrap();

        assert_eq!(frame.len(), HEADER_SIZE);
        let header = codec.decode_header(&frame).unwrap();
        assert_eq!(header.length, 0);
        assert_eq!(header.header_crc, crc::crc16(&frame[..HEADER_CRC_SPAN]));
    }

    #[test]
    fn test_encode_with_payload() {
        let codec = FrameCodec::default();
        let frame = codec
            .encode(SeqNumber::new(9), 0, Flags::NONE, 0x21, b"hello")
            .unwrap();

        assert_eq!(frame.len(), HEADER_SIZE + 5 + PAYLOAD_CRC_SIZE);
        assert_eq!(&frame[HEADER_SIZE..HEADER_SIZE + 5], b"hello");
        let trailer = &frame[HEADER_SIZE + 5..];
        assert_eq!(trailer, &crc::crc32(b"hello").to_le_bytes());
    }

    #[test]
    fn test_decode_roundtrip() {
        let codec = FrameCodec::default();
        let flags = Flags::FRAGMENT | Flags::ACK_REQ;
        let frame = codec
            .encode(SeqNumber::new(200), 5, flags, 0x33, b"payload")
            .unwrap();

        let packet = codec.decode(&frame).unwrap();
        assert_eq!(packet.sequence(), SeqNumber::new(200));
        assert_eq!(packet.channel(), 5);
        assert_eq!(packet.flags(), flags);
        assert_eq!(packet.opcode(), 0x33);
        assert_eq!(&packet.payload[..], b"payload");
        assert_eq!(packet.payload_crc, Some(crc::crc32(b"payload")));
        assert!(codec.check_header(&frame, &packet.header, true));
    }

    #[test]
    fn test_decode_truncated() {
        let codec = FrameCodec::default();
        let frame = codec
            .encode(SeqNumber::new(0), 0, Flags::NONE, 1, b"abc")
            .unwrap();

        let err = codec.decode(&frame[..frame.len() - 1]).unwrap_err();
        assert!(matches!(err, PacketError::InsufficientData { .. }));
    }

    #[test]
    fn test_payload_too_large() {
        let codec = FrameCodec::default();
        let payload = vec![0u8; u16::MAX as usize + 1];
        let err = codec
            .encode(SeqNumber::new(0), 0, Flags::NONE, 1, &payload)
            .unwrap_err();
        assert!(matches!(err, PacketError::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_crc_checks_can_be_disabled() {
        let codec = FrameCodec::default();
        let mut frame = codec
            .encode(SeqNumber::new(0), 0, Flags::NONE, 1, b"abc")
            .unwrap();
        frame[8] ^= 0xFF;

        let header = codec.decode_header(&frame).unwrap();
        assert!(!codec.check_header(&frame, &header, true));
        assert!(codec.check_header(&frame, &header, false));
        assert!(!codec.check_payload(b"abd", crc::crc32(b"abc"), true));
        assert!(codec.check_payload(b"abd", crc::crc32(b"abc"), false));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_decode_inverts_encode(
                seq in any::<u8>(),
                channel in any::<u8>(),
                flags in any::<u8>(),
                opcode in any::<u8>(),
                payload in prop::collection::vec(any::<u8>(), 0..256),
            ) {
                let codec = FrameCodec::default();
                let flags = Flags::from_bits(flags);
                let frame = codec
                    .encode(SeqNumber::new(seq), channel, flags, opcode, &payload)
                    .unwrap();

                let packet = codec.decode(&frame).unwrap();
                prop_assert_eq!(packet.sequence(), SeqNumber::new(seq));
                prop_assert_eq!(packet.channel(), channel);
                prop_assert_eq!(packet.flags(), flags);
                prop_assert_eq!(packet.opcode(), opcode);
                prop_assert_eq!(&packet.payload[..], &payload[..]);
                prop_assert!(codec.check_header(&frame, &packet.header, true));
            }
        }
    }
}
