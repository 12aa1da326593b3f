//! OMVP Transport Engine
//!
//! Owns the link, the receive buffer and the parser, and layers the
//! reliability rules on top of raw parsed packets: ACKs, NAK status mapping,
//! duplicate retransmission suppression, fragment reassembly and event
//! dispatch.
//!
//! One logical receive walks this loop until it delivers, fails or times out:
//!
//! ```text
//! Idle → AwaitingPacket ─┬─ DuplicateDiscard   ─┐
//!                        ├─ EventDispatch       ├─→ AwaitingPacket
//!                        ├─ FragmentAccumulate ─┘
//!                        ├─ Delivered
//!                        ├─ NakRaised
//!                        └─ TimedOut
//! ```

use crate::config::{clamp_rate, TransportConfig};
use crate::error::TransportError;
use crate::event::{event_code, EventHandler};
use bytes::{Bytes, BytesMut};
use omvp_io::{Link, Timer};
use omvp_protocol::{
    ByteRingBuffer, Capabilities, Flags, FrameCodec, FrameParser, Header, Packet, SeqNumber,
    Statistics, Status, PROTO_SYNC,
};
use rand::Rng;
use std::thread;
use tracing::{debug, info, trace, warn};

/// Caller-visible outcome of a logical receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Reply carrying a (possibly reassembled) payload
    Data(Bytes),
    /// Bare acknowledgement without payload
    Ack,
    /// Peer answered with a BUSY NAK; retrying is expected
    Busy,
}

impl Reply {
    pub fn is_busy(&self) -> bool {
        matches!(self, Reply::Busy)
    }

    /// Payload bytes, empty for `Ack` and `Busy`
    pub fn payload(&self) -> &[u8] {
        match self {
            Reply::Data(data) => &data[..],
            Reply::Ack | Reply::Busy => &[],
        }
    }
}

/// A delivered reply together with the header of the packet that completed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub opcode: u8,
    pub channel: u8,
    /// Sequence number of the terminating packet
    pub sequence: SeqNumber,
    pub flags: Flags,
    pub reply: Reply,
}

/// Synchronous OMVP transport over a single link
pub struct TransportEngine<L: Link> {
    link: L,
    config: TransportConfig,
    caps: Capabilities,
    codec: FrameCodec,
    parser: FrameParser,
    ring: ByteRingBuffer,
    /// Link read staging area, one maximal frame long
    scratch: Vec<u8>,
    sequence: SeqNumber,
    stats: Statistics,
    event_handler: Option<Box<dyn EventHandler + Send>>,
}

impl<L: Link> TransportEngine<L> {
    /// Create an engine over `link`
    pub fn new(link: L, config: TransportConfig) -> Self {
        let caps = config.caps;
        let codec = FrameCodec::new(config.crc);

        TransportEngine {
            link,
            caps,
            codec,
            parser: FrameParser::new(codec),
            ring: ByteRingBuffer::with_capacity(caps.ring_capacity()),
            scratch: vec![0u8; caps.max_frame_len()],
            sequence: SeqNumber::default(),
            stats: Statistics::default(),
            event_handler: None,
            config,
        }
    }

    /// Install the handler EVENT packets are delivered to
    pub fn with_event_handler<H>(mut self, handler: H) -> Self
    where
        H: EventHandler + Send + 'static,
    {
        self.set_event_handler(handler);
        self
    }

    pub fn set_event_handler<H>(&mut self, handler: H)
    where
        H: EventHandler + Send + 'static,
    {
        self.event_handler = Some(Box::new(handler));
    }

    /// Current capabilities
    pub fn caps(&self) -> Capabilities {
        self.caps
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Snapshot of the statistics counters
    pub fn stats(&self) -> Statistics {
        self.stats
    }

    /// Sequence number the next ordinary packet is stamped with and expected to carry
    pub fn sequence(&self) -> SeqNumber {
        self.sequence
    }

    /// Force the sequence counter, for a peer answering `PROTO_SYNC`
    pub fn set_sequence(&mut self, sequence: SeqNumber) {
        debug!(from = %self.sequence, to = %sequence, "sequence counter set");
        self.sequence = sequence;
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Encode and write one packet.
    ///
    /// Uses `sequence` when given, the current counter otherwise. Never
    /// advances the counter.
    pub fn send_packet(
        &mut self,
        opcode: u8,
        channel: u8,
        flags: Flags,
        data: Option<&[u8]>,
        sequence: Option<SeqNumber>,
    ) -> Result<(), TransportError> {
        let payload = data.unwrap_or(&[]);
        let max = self.caps.max_payload as usize;
        if payload.len() > max {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        let sequence = sequence.unwrap_or(self.sequence);
        let frame = self
            .codec
            .encode(sequence, channel, flags, opcode, payload)?;
        self.link.write_frame(&frame)?;
        self.stats.sent += 1;

        debug!(
            sequence = %sequence,
            channel,
            opcode,
            ?flags,
            len = payload.len(),
            "packet sent"
        );
        Ok(())
    }

    /// Receive one logical message.
    ///
    /// With `poll_events` set, returns `Ok(None)` as soon as no complete
    /// packet is buffered, after dispatching any events that were. Otherwise
    /// waits up to the configured timeout and fails with
    /// `TransportError::Timeout`.
    ///
    /// `Reply::Busy` is returned, not raised, for a BUSY NAK.
    pub fn recv_packet(&mut self, poll_events: bool) -> Result<Option<Reply>, TransportError> {
        Ok(self.recv_message(poll_events)?.map(|message| message.reply))
    }

    /// Same as `recv_packet`, keeping the header fields of the packet that
    /// completed the message
    pub fn recv_message(&mut self, poll_events: bool) -> Result<Option<Message>, TransportError> {
        let mut timer = Timer::new(self.config.timeout);
        let mut fragments = BytesMut::new();

        while !timer.expired() {
            self.drain_link()?;

            let packet = match self.parser.poll(
                &mut self.ring,
                self.sequence,
                &self.caps,
                &mut self.stats,
            ) {
                Some(packet) => packet,
                None if poll_events => return Ok(None),
                None => {
                    thread::sleep(self.config.poll_interval.min(timer.remaining()));
                    continue;
                }
            };

            if simulate_loss(self.config.drop_rate) {
                warn!(%packet, "simulated packet loss");
                continue;
            }

            self.stats.received += 1;
            debug!(%packet, "packet received");
            let header = packet.header;

            if header.is_retransmission() && !header.is_event() && header.sequence != self.sequence {
                debug!(
                    sequence = %header.sequence,
                    expected = %self.sequence,
                    "duplicate retransmission discarded"
                );
                if header.wants_ack() {
                    self.acknowledge(&header)?;
                }
                continue;
            }

            if header.wants_ack() {
                if simulate_loss(self.config.ack_drop_rate) {
                    warn!(sequence = %header.sequence, "simulated ack loss");
                } else {
                    self.acknowledge(&header)?;
                }
            }

            if header.is_event() {
                self.dispatch_event(&packet);
                timer.reset();
                continue;
            }

            self.sequence.increment();

            if header.is_fragment() {
                fragments.extend_from_slice(&packet.payload);
                trace!(buffered = fragments.len(), "fragment accumulated");
                timer.reset();
                continue;
            }

            let payload = if fragments.is_empty() {
                packet.payload
            } else {
                fragments.extend_from_slice(&packet.payload);
                debug!(len = fragments.len(), "fragmented message reassembled");
                fragments.split().freeze()
            };

            let reply = if header.is_nak() {
                nak_reply(&payload)?
            } else if payload.is_empty() {
                Reply::Ack
            } else {
                Reply::Data(payload)
            };

            return Ok(Some(Message {
                opcode: header.opcode,
                channel: header.channel,
                sequence: header.sequence,
                flags: header.flags,
                reply,
            }));
        }

        if poll_events {
            Ok(None)
        } else {
            debug!(timeout = ?self.config.timeout, "receive timed out");
            Err(TransportError::Timeout)
        }
    }

    /// Send a request and wait for its reply
    pub fn request(
        &mut self,
        opcode: u8,
        channel: u8,
        data: Option<&[u8]>,
    ) -> Result<Reply, TransportError> {
        let flags = if self.caps.ack_enabled {
            Flags::ACK_REQ
        } else {
            Flags::NONE
        };

        self.send_packet(opcode, channel, flags, data, None)?;
        self.recv_packet(false)?.ok_or(TransportError::Timeout)
    }

    /// `request`, repeated while the peer answers BUSY.
    ///
    /// Makes at most `attempts` requests (at least one) and returns
    /// `Reply::Busy` if the peer stayed busy throughout.
    pub fn request_with_retry(
        &mut self,
        opcode: u8,
        channel: u8,
        data: Option<&[u8]>,
        attempts: usize,
    ) -> Result<Reply, TransportError> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            match self.request(opcode, channel, data)? {
                Reply::Busy => {
                    debug!(attempt, attempts, opcode, "peer busy");
                    if attempt < attempts {
                        thread::sleep(self.config.busy_backoff);
                    }
                }
                reply => return Ok(reply),
            }
        }
        Ok(Reply::Busy)
    }

    /// Re-establish synchronization with a peer in an unknown state
    pub fn sync(&mut self) -> Result<Reply, TransportError> {
        self.resync();
        self.request(PROTO_SYNC, 0, None)
    }

    /// Drop buffered bytes, reset the parser and restart the sequence at 0
    pub fn resync(&mut self) {
        info!(
            discarded = self.ring.len(),
            sequence = %self.sequence,
            "transport resynchronized"
        );
        self.ring.clear();
        self.parser.reset();
        self.sequence = SeqNumber::default();
    }

    /// Replace the capabilities.
    ///
    /// Reallocates the receive and scratch buffers; bytes buffered but not
    /// yet parsed are discarded. Call only between exchanges.
    pub fn update_caps(&mut self, crc: bool, seq: bool, ack: bool, max_payload: u16) {
        let caps = Capabilities::new(crc, seq, ack, max_payload);
        if !self.ring.is_empty() {
            warn!(
                discarded = self.ring.len(),
                "unparsed bytes dropped by capability update"
            );
        }

        self.ring = ByteRingBuffer::with_capacity(caps.ring_capacity());
        self.scratch = vec![0u8; caps.max_frame_len()];
        self.parser.reset();
        self.caps = caps;

        info!(
            crc_enabled = crc,
            seq_enabled = seq,
            ack_enabled = ack,
            max_payload,
            "capabilities updated"
        );
    }

    /// Move whatever the link has into the ring buffer
    fn drain_link(&mut self) -> Result<(), TransportError> {
        loop {
            let available = self.link.bytes_available()?;
            let n = available.min(self.scratch.len()).min(self.ring.free());
            if n == 0 {
                return Ok(());
            }

            let read = self.link.read(&mut self.scratch[..n])?;
            if read == 0 {
                return Ok(());
            }
            self.ring.extend(&self.scratch[..read])?;
            trace!(read, buffered = self.ring.len(), "link drained");
        }
    }

    /// ACK `header`, stamped with the peer's sequence number
    fn acknowledge(&mut self, header: &Header) -> Result<(), TransportError> {
        if !self.caps.ack_enabled {
            return Ok(());
        }
        self.send_packet(
            header.opcode,
            header.channel,
            Flags::ACK,
            None,
            Some(header.sequence),
        )
    }

    fn dispatch_event(&mut self, packet: &Packet) {
        let channel = packet.channel();
        let code = event_code(&packet.payload);
        debug!(channel, code, "event received");

        if let Some(handler) = self.event_handler.as_mut() {
            handler.on_event(channel, code);
        }
    }
}

/// Turn a NAK payload into a reply or the error it stands for
fn nak_reply(payload: &[u8]) -> Result<Reply, TransportError> {
    let status = Status::from_payload(payload).ok_or(TransportError::MalformedNak {
        len: payload.len(),
    })?;

    match TransportError::from_status(status) {
        None => Ok(Reply::Busy),
        Some(err) => {
            warn!(%status, "peer rejected request");
            Err(err)
        }
    }
}

/// Roll the loss simulation; rates outside `[0.0, 1.0]` (or NaN) are clamped
fn simulate_loss(rate: f64) -> bool {
    let rate = clamp_rate(rate);
    rate > 0.0 && rand::thread_rng().gen_bool(rate)
}
