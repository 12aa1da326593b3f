//! Device emulator
//!
//! Plays the device side of an OMVP link for testing hosts: echoes request
//! payloads back, answers `PROTO_SYNC`, reports BUSY on demand, splits
//! replies into fragments on demand and emits periodic events.

use crate::config::EmulatorSettings;
use omvp::{Message, TransportEngine, TransportError};
use omvp_io::{Link, Timer};
use omvp_protocol::{Flags, SeqNumber, Status, PROTO_SYNC};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, info, warn};

/// Opcode of unsolicited event packets
pub const EVENT_OPCODE: u8 = 0x80;

/// Requests with this opcode are always answered with a BUSY NAK
pub const OPCODE_BUSY: u8 = 0xFE;

/// Requests with this opcode are echoed back as a fragmented reply
pub const OPCODE_FRAGMENTED: u8 = 0xFD;

/// Device side of a link
pub struct Emulator<L: Link> {
    engine: TransportEngine<L>,
    settings: EmulatorSettings,
    event_timer: Option<Timer>,
    next_event: u16,
    served: u64,
}

impl<L: Link> Emulator<L> {
    /// Wrap `engine`.
    ///
    /// The engine should run with ACKs disabled: every reply the emulator
    /// sends already acknowledges its request.
    pub fn new(engine: TransportEngine<L>, settings: EmulatorSettings) -> Self {
        if engine.caps().ack_enabled {
            warn!("emulator engine acknowledges requests; hosts will see bare ACKs before replies");
        }
        let event_timer = settings.event_interval().map(Timer::new);

        Emulator {
            engine,
            settings,
            event_timer,
            next_event: 0,
            served: 0,
        }
    }

    /// Requests answered so far
    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn engine(&self) -> &TransportEngine<L> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TransportEngine<L> {
        &mut self.engine
    }

    /// Serve whatever is buffered and emit a due event.
    ///
    /// Returns whether a request was answered.
    pub fn step(&mut self) -> Result<bool, TransportError> {
        self.emit_due_event();

        match self.engine.recv_message(true) {
            Ok(Some(message)) => {
                self.answer(message)?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e @ TransportError::Link(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "request rejected");
                Ok(false)
            }
        }
    }

    /// Serve requests until `stop` is raised or the link fails
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<u64, TransportError> {
        info!("emulator serving");
        while !stop.load(Ordering::Relaxed) {
            if !self.step()? {
                thread::sleep(self.engine.config().poll_interval);
            }
        }
        info!(served = self.served, "emulator stopped");
        Ok(self.served)
    }

    /// Send the next event now
    pub fn emit_event(&mut self) -> Result<(), TransportError> {
        let code = self.next_event;
        self.engine.send_packet(
            EVENT_OPCODE,
            self.settings.event_channel,
            Flags::EVENT,
            Some(&code.to_le_bytes()),
            None,
        )?;
        self.next_event = self.next_event.wrapping_add(1);
        debug!(code, "event emitted");
        Ok(())
    }

    fn emit_due_event(&mut self) {
        let due = match self.event_timer.as_mut() {
            Some(timer) if timer.expired() => {
                timer.reset();
                true
            }
            _ => false,
        };

        // A UDP link has nowhere to send before the host first speaks
        if due {
            if let Err(e) = self.emit_event() {
                debug!(error = %e, "event not sent");
            }
        }
    }

    fn answer(&mut self, message: Message) -> Result<(), TransportError> {
        let Message {
            opcode,
            channel,
            sequence,
            reply,
            ..
        } = message;
        debug!(opcode, channel, %sequence, len = reply.payload().len(), "request received");

        match opcode {
            PROTO_SYNC => {
                self.engine.set_sequence(sequence.next());
                self.engine
                    .send_packet(opcode, channel, Flags::ACK, None, Some(sequence))?;
                info!("host synchronized");
            }
            OPCODE_BUSY => {
                self.engine.send_packet(
                    opcode,
                    channel,
                    Flags::NAK,
                    Some(&Status::Busy.to_payload()),
                    Some(sequence),
                )?;
            }
            OPCODE_FRAGMENTED => {
                self.send_fragmented(opcode, channel, sequence, reply.payload())?;
            }
            _ => {
                self.engine
                    .send_packet(opcode, channel, Flags::ACK, Some(reply.payload()), Some(sequence))?;
            }
        }

        self.served += 1;
        Ok(())
    }

    /// Reply in `fragment_size` pieces, one sequence number each
    fn send_fragmented(
        &mut self,
        opcode: u8,
        channel: u8,
        first: SeqNumber,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![payload]
        } else {
            payload.chunks(self.settings.fragment_size.max(1)).collect()
        };
        let last = chunks.len() - 1;

        let mut sequence = first;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let flags = if i == last { Flags::ACK } else { Flags::FRAGMENT };
            self.engine
                .send_packet(opcode, channel, flags, Some(chunk), Some(sequence))?;
            sequence.increment();
        }

        // The request already advanced the counter past `first`
        self.engine.set_sequence(sequence);
        debug!(fragments = last + 1, "fragmented reply sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omvp::{Reply, TransportConfig};
    use omvp_io::MemoryLink;
    use omvp_protocol::Capabilities;

    fn device_config() -> TransportConfig {
        TransportConfig::default().with_caps(Capabilities::new(true, true, false, 4096))
    }

    fn setup(settings: EmulatorSettings) -> (TransportEngine<MemoryLink>, Emulator<MemoryLink>) {
        let (host, device) = MemoryLink::pair();
        let host = TransportEngine::new(host, TransportConfig::default());
        let emulator = Emulator::new(TransportEngine::new(device, device_config()), settings);
        (host, emulator)
    }

    fn quiet() -> EmulatorSettings {
        EmulatorSettings {
            event_interval_ms: 0,
            ..EmulatorSettings::default()
        }
    }

    #[test]
    fn test_echo() {
        let (mut host, mut emulator) = setup(quiet());

        host.send_packet(0x10, 3, Flags::ACK_REQ, Some(b"hello"), None)
            .unwrap();
        assert!(emulator.step().unwrap());

        let message = host.recv_message(false).unwrap().unwrap();
        assert_eq!(message.reply.payload(), b"hello");
        assert_eq!(message.channel, 3);
        assert_eq!(message.opcode, 0x10);
        assert_eq!(emulator.served(), 1);
        assert_eq!(emulator.engine().sequence(), host.sequence());
    }

    #[test]
    fn test_busy() {
        let (mut host, mut emulator) = setup(quiet());

        host.send_packet(OPCODE_BUSY, 0, Flags::ACK_REQ, None, None)
            .unwrap();
        emulator.step().unwrap();
        assert_eq!(host.recv_packet(false).unwrap(), Some(Reply::Busy));
    }

    #[test]
    fn test_fragmented_reply_keeps_sequences_aligned() {
        let settings = EmulatorSettings {
            fragment_size: 3,
            ..quiet()
        };
        let (mut host, mut emulator) = setup(settings);

        host.send_packet(OPCODE_FRAGMENTED, 0, Flags::ACK_REQ, Some(b"abcdefgh"), None)
            .unwrap();
        emulator.step().unwrap();
        let reply = host.recv_packet(false).unwrap().unwrap();
        assert_eq!(reply.payload(), b"abcdefgh");
        assert_eq!(host.sequence(), SeqNumber::new(3));
        assert_eq!(emulator.engine().sequence(), SeqNumber::new(3));

        host.send_packet(0x10, 0, Flags::ACK_REQ, Some(b"next"), None)
            .unwrap();
        emulator.step().unwrap();
        assert_eq!(host.recv_packet(false).unwrap().unwrap().payload(), b"next");
    }

    #[test]
    fn test_sync_from_unknown_state() {
        let (mut host, mut emulator) = setup(quiet());
        emulator.engine_mut().set_sequence(SeqNumber::new(42));

        host.send_packet(PROTO_SYNC, 0, Flags::ACK_REQ, None, None)
            .unwrap();
        emulator.step().unwrap();
        assert_eq!(host.recv_packet(false).unwrap(), Some(Reply::Ack));
        assert_eq!(emulator.engine().sequence(), SeqNumber::new(1));
        assert_eq!(host.sequence(), SeqNumber::new(1));
    }

    #[test]
    fn test_events_counted() {
        let (mut host, mut emulator) = setup(quiet());
        emulator.emit_event().unwrap();
        emulator.emit_event().unwrap();

        assert_eq!(host.recv_packet(true).unwrap(), None);
        assert_eq!(host.stats().received, 2);
        assert_eq!(host.sequence(), SeqNumber::new(0));
    }
}
