//! Wire format tests
//!
//! Fixed byte vectors for the OMVP frame layout, checked against both the
//! encoder and the parser.

use omvp_protocol::status::code;
use omvp_protocol::{
    ByteRingBuffer, Capabilities, Flags, FrameCodec, FrameParser, Header, ParserState,
    SeqNumber, Statistics, Status, HEADER_SIZE, PAYLOAD_CRC_SIZE,
};

/// seq 1, channel 2, ACK_REQ, opcode 0x42, payload "hi"
const REQUEST_FRAME: [u8; 16] = [
    0xAA, 0xD5, 0x01, 0x02, 0x08, 0x42, 0x02, 0x00, 0x2D, 0x8F, 0x68, 0x69, 0xAC, 0x2A, 0x93,
    0xD8,
];

/// seq 0, channel 0, ACK, opcode 0 (PROTO_SYNC), no payload
const SYNC_ACK_FRAME: [u8; 10] = [0xAA, 0xD5, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0xD6, 0x68];

fn parse_one(bytes: &[u8], expected: u8, caps: &Capabilities) -> (Option<omvp_protocol::Packet>, Statistics) {
    let mut ring = ByteRingBuffer::with_capacity(1024);
    ring.extend(bytes).unwrap();
    let mut parser = FrameParser::default();
    let mut stats = Statistics::default();
    let packet = parser.poll(&mut ring, SeqNumber::new(expected), caps, &mut stats);
    (packet, stats)
}

#[test]
fn test_encode_matches_wire_vector() {
    let frame = FrameCodec::default()
        .encode(SeqNumber::new(1), 2, Flags::ACK_REQ, 0x42, b"hi")
        .unwrap();
    assert_eq!(&frame[..], &REQUEST_FRAME[..]);

    let frame = FrameCodec::default()
        .encode(SeqNumber::new(0), 0, Flags::ACK, 0x00, &[])
        .unwrap();
    assert_eq!(&frame[..], &SYNC_ACK_FRAME[..]);
}

#[test]
fn test_header_layout() {
    let header = Header::from_bytes(&REQUEST_FRAME).unwrap();
    assert_eq!(header.sequence, SeqNumber::new(1));
    assert_eq!(header.channel, 2);
    assert_eq!(header.flags, Flags::ACK_REQ);
    assert_eq!(header.opcode, 0x42);
    assert_eq!(header.length, 2);
    assert_eq!(header.header_crc, 0x8F2D);
    assert_eq!(header.frame_len(), HEADER_SIZE + 2 + PAYLOAD_CRC_SIZE);
    assert!(header.wants_ack());
}

#[test]
fn test_parse_wire_vector() {
    let (packet, stats) = parse_one(&REQUEST_FRAME, 1, &Capabilities::default());
    let packet = packet.unwrap();
    assert_eq!(&packet.payload[..], b"hi");
    assert_eq!(packet.payload_crc, Some(0xD893_2AAC));
    assert_eq!(stats, Statistics::default());
}

#[test]
fn test_empty_payload_has_no_payload_crc() {
    let (packet, _) = parse_one(&SYNC_ACK_FRAME, 0, &Capabilities::default());
    let packet = packet.unwrap();
    assert!(packet.payload.is_empty());
    assert_eq!(packet.payload_crc, None);
    assert_eq!(packet.size(), HEADER_SIZE);
}

#[test]
fn test_header_crc_corruption() {
    let mut frame = REQUEST_FRAME;
    frame[5] ^= 0x01;

    let (packet, stats) = parse_one(&frame, 1, &Capabilities::default());
    assert!(packet.is_none());
    assert_eq!(stats.checksum_failures, 1);
}

#[test]
fn test_payload_crc_corruption() {
    let mut frame = REQUEST_FRAME;
    frame[10] ^= 0x01;

    let (packet, stats) = parse_one(&frame, 1, &Capabilities::default());
    assert!(packet.is_none());
    assert_eq!(stats.checksum_failures, 1);
}

#[test]
fn test_crc_disabled_accepts_corruption() {
    let mut frame = REQUEST_FRAME;
    frame[10] = b'H';
    frame[8] = 0;

    let caps = Capabilities::new(false, true, true, 4096);
    let (packet, stats) = parse_one(&frame, 1, &caps);
    assert_eq!(&packet.unwrap().payload[..], b"Hi");
    assert_eq!(stats.checksum_failures, 0);
}

#[test]
fn test_sequence_enforcement() {
    let (packet, stats) = parse_one(&REQUEST_FRAME, 7, &Capabilities::default());
    assert!(packet.is_none());
    assert_eq!(stats.sequence_failures, 1);

    let caps = Capabilities::new(true, false, true, 4096);
    let (packet, _) = parse_one(&REQUEST_FRAME, 7, &caps);
    assert!(packet.is_some());
}

#[test]
fn test_proto_sync_bypasses_sequence() {
    let (packet, stats) = parse_one(&SYNC_ACK_FRAME, 200, &Capabilities::default());
    assert!(packet.is_some());
    assert_eq!(stats.sequence_failures, 0);
}

#[test]
fn test_oversize_length_not_counted() {
    let caps = Capabilities::new(true, true, true, 1);
    let (packet, stats) = parse_one(&REQUEST_FRAME, 1, &caps);
    assert!(packet.is_none());
    assert_eq!(stats.rejected(), 0);
}

#[test]
fn test_partial_frame_waits() {
    let mut ring = ByteRingBuffer::with_capacity(1024);
    let mut parser = FrameParser::default();
    let mut stats = Statistics::default();
    let caps = Capabilities::default();

    ring.extend(&REQUEST_FRAME[..4]).unwrap();
    assert!(parser.poll(&mut ring, SeqNumber::new(1), &caps, &mut stats).is_none());
    assert_eq!(parser.state(), ParserState::Header);

    ring.extend(&REQUEST_FRAME[4..12]).unwrap();
    assert!(parser.poll(&mut ring, SeqNumber::new(1), &caps, &mut stats).is_none());
    assert!(matches!(parser.state(), ParserState::Payload { .. }));

    ring.extend(&REQUEST_FRAME[12..]).unwrap();
    let packet = parser.poll(&mut ring, SeqNumber::new(1), &caps, &mut stats);
    assert_eq!(&packet.unwrap().payload[..], b"hi");
    assert_eq!(parser.state(), ParserState::Sync);
    assert!(ring.is_empty());
}

#[test]
fn test_back_to_back_frames() {
    let mut wire = Vec::new();
    wire.extend_from_slice(&SYNC_ACK_FRAME);
    wire.extend_from_slice(&REQUEST_FRAME);

    let mut ring = ByteRingBuffer::with_capacity(1024);
    ring.extend(&wire).unwrap();
    let mut parser = FrameParser::default();
    let mut stats = Statistics::default();
    let caps = Capabilities::default();

    let first = parser.poll(&mut ring, SeqNumber::new(0), &caps, &mut stats);
    assert_eq!(first.unwrap().opcode(), 0x00);
    let second = parser.poll(&mut ring, SeqNumber::new(1), &caps, &mut stats);
    assert_eq!(second.unwrap().opcode(), 0x42);
}

#[test]
fn test_status_payloads() {
    assert_eq!(Status::Busy.to_payload(), [0x04, 0x00]);
    assert_eq!(Status::from_payload(&[0x05, 0x00]), Some(Status::Checksum));
    assert_eq!(Status::from_payload(&[0x06, 0x00, 0xFF]), Some(Status::Sequence));
    assert_eq!(Status::from_payload(&[0x04]), None);
    assert_eq!(Status::from_u16(code::FRAGMENT).name(), "FRAGMENT");
}
