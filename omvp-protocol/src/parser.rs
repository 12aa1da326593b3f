//! Resynchronizing frame parser
//!
//! Pulls validated packets out of a `ByteRingBuffer` that may hold any mix
//! of partial frames, corrupted frames and line noise. The parser walks a
//! three-state machine:
//!
//! - `Sync`: look for the sync word, one byte at a time
//! - `Header`: wait for and validate the 10-byte header
//! - `Payload`: wait for and validate payload + CRC32
//!
//! Any validation failure drops exactly one byte and goes back to `Sync`,
//! so a corrupted frame never costs more than the bytes up to the next
//! genuine sync word. A valid frame is consumed whole.

use crate::buffer::ByteRingBuffer;
use crate::caps::Capabilities;
use crate::codec::{split_frame, FrameCodec};
use crate::packet::{Flags, Header, Packet, HEADER_SIZE, PAYLOAD_CRC_SIZE, PROTO_SYNC, SYNC_WORD};
use crate::sequence::SeqNumber;
use crate::stats::Statistics;
use bytes::Buf;
use tracing::{debug, trace, warn};

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Scanning for the sync word
    Sync,
    /// Sync word found, waiting for a complete header
    Header,
    /// Header accepted, waiting for `pending_len` bytes of frame
    Payload { pending_len: usize },
}

/// Why a header was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Oversize { length: u16, max: u16 },
    Sequence { got: SeqNumber, expected: SeqNumber },
    HeaderCrc,
}

/// Incremental OMVP frame parser
#[derive(Debug)]
pub struct FrameParser {
    codec: FrameCodec,
    state: ParserState,
}

impl FrameParser {
    /// Create a parser in the `Sync` state
    pub fn new(codec: FrameCodec) -> Self {
        FrameParser {
            codec,
            state: ParserState::Sync,
        }
    }

    /// Current state
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Forget any partially parsed frame
    pub fn reset(&mut self) {
        self.state = ParserState::Sync;
    }

    /// Try to extract the next validated packet.
    ///
    /// Non-blocking: returns `None` as soon as the buffered bytes run out.
    /// `expected` is the sequence number an ordinary packet must carry to be
    /// accepted. Rejections are counted in `stats`.
    pub fn poll(
        &mut self,
        ring: &mut ByteRingBuffer,
        expected: SeqNumber,
        caps: &Capabilities,
        stats: &mut Statistics,
    ) -> Option<Packet> {
        loop {
            match self.state {
                ParserState::Sync => loop {
                    match ring.peek16() {
                        Some(SYNC_WORD) => {
                            trace!(buffered = ring.len(), "sync word found");
                            self.state = ParserState::Header;
                            break;
                        }
                        Some(_) => ring.consume(1),
                        None => return None,
                    }
                },

                ParserState::Header => {
                    let bytes = ring.peek(HEADER_SIZE)?;
                    let header = self.codec.decode_header(bytes).ok()?;

                    match self.validate_header(bytes, &header, expected, caps) {
                        Ok(()) => {
                            self.state = ParserState::Payload {
                                pending_len: header.frame_len(),
                            };
                        }
                        Err(rejection) => {
                            match rejection {
                                Rejection::Oversize { length, max } => {
                                    warn!(length, max, "header rejected: payload too large");
                                }
                                Rejection::Sequence { got, expected } => {
                                    stats.sequence_failures += 1;
                                    debug!(%got, %expected, "header rejected: unexpected sequence");
                                }
                                Rejection::HeaderCrc => {
                                    stats.checksum_failures += 1;
                                    warn!(
                                        sequence = %header.sequence,
                                        opcode = header.opcode,
                                        "header rejected: bad header crc"
                                    );
                                }
                            }
                            ring.consume(1);
                            self.state = ParserState::Sync;
                        }
                    }
                }

                ParserState::Payload { pending_len } => {
                    let frame = ring.peek(pending_len)?;
                    let header = self.codec.decode_header(frame).ok()?;

                    if !self.payload_valid(frame, &header, caps) {
                        stats.checksum_failures += 1;
                        warn!(
                            sequence = %header.sequence,
                            opcode = header.opcode,
                            length = header.length,
                            "payload rejected: bad payload crc"
                        );
                        ring.consume(1);
                        self.state = ParserState::Sync;
                        continue;
                    }

                    let frame = ring.take(pending_len)?;
                    self.state = ParserState::Sync;

                    let packet = split_frame(header, frame);
                    trace!(%packet, "frame parsed");
                    return Some(packet);
                }
            }
        }
    }

    fn validate_header(
        &self,
        bytes: &[u8],
        header: &Header,
        expected: SeqNumber,
        caps: &Capabilities,
    ) -> Result<(), Rejection> {
        if header.length > caps.max_payload {
            return Err(Rejection::Oversize {
                length: header.length,
                max: caps.max_payload,
            });
        }

        if !sequence_accepted(header, expected, caps) {
            return Err(Rejection::Sequence {
                got: header.sequence,
                expected,
            });
        }

        if !self.codec.check_header(bytes, header, caps.crc_enabled) {
            return Err(Rejection::HeaderCrc);
        }

        Ok(())
    }

    fn payload_valid(&self, frame: &[u8], header: &Header, caps: &Capabilities) -> bool {
        if header.length == 0 {
            return true;
        }

        let payload_end = HEADER_SIZE + header.length as usize;
        let payload = &frame[HEADER_SIZE..payload_end];
        let mut trailer = &frame[payload_end..payload_end + PAYLOAD_CRC_SIZE];
        let expected = trailer.get_u32_le();

        self.codec.check_payload(payload, expected, caps.crc_enabled)
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        FrameParser::new(FrameCodec::default())
    }
}

/// Events, retransmissions and `PROTO_SYNC` are exempt from sequence checks
fn sequence_accepted(header: &Header, expected: SeqNumber, caps: &Capabilities) -> bool {
    !caps.seq_enabled
        || header.flags.contains(Flags::EVENT)
        || header.flags.contains(Flags::RTX)
        || header.opcode == PROTO_SYNC
        || header.sequence == expected
}
