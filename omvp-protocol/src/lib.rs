//! OMVP Protocol Core Implementation
//!
//! This crate implements the wire-level part of the OMVP protocol: packet
//! structures, flag and status definitions, frame encoding with pluggable
//! CRC functions, the receive byte buffer, and the resynchronizing frame
//! parser. It performs no I/O.

pub mod buffer;
pub mod caps;
pub mod codec;
pub mod crc;
pub mod packet;
pub mod parser;
pub mod sequence;
pub mod stats;
pub mod status;

pub use buffer::{BufferError, ByteRingBuffer};
pub use caps::{Capabilities, MIN_RING_CAPACITY};
pub use codec::FrameCodec;
pub use crc::CrcSuite;
pub use packet::{
    Flags, Header, Packet, PacketError, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, PAYLOAD_CRC_SIZE,
    PROTO_SYNC, SYNC_WORD,
};
pub use parser::{FrameParser, ParserState};
pub use sequence::SeqNumber;
pub use stats::Statistics;
pub use status::Status;
