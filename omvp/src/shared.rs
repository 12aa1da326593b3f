//! Thread-shareable transport handle
//!
//! The engine itself is single-threaded; `SharedTransport` serializes whole
//! request/reply exchanges so several threads can use one link.

use crate::engine::{Reply, TransportEngine};
use crate::error::TransportError;
use omvp_io::Link;
use omvp_protocol::Statistics;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to a transport engine behind a mutex
pub struct SharedTransport<L: Link> {
    engine: Arc<Mutex<TransportEngine<L>>>,
}

impl<L: Link> Clone for SharedTransport<L> {
    fn clone(&self) -> Self {
        SharedTransport {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<L: Link> SharedTransport<L> {
    pub fn new(engine: TransportEngine<L>) -> Self {
        SharedTransport {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run one request/reply exchange while holding the engine
    pub fn request(
        &self,
        opcode: u8,
        channel: u8,
        data: Option<&[u8]>,
    ) -> Result<Reply, TransportError> {
        self.engine.lock().request(opcode, channel, data)
    }

    /// Dispatch buffered events without waiting.
    ///
    /// Returns a reply if one was already buffered behind the events.
    pub fn poll_events(&self) -> Result<Option<Reply>, TransportError> {
        self.engine.lock().recv_packet(true)
    }

    pub fn stats(&self) -> Statistics {
        self.engine.lock().stats()
    }

    /// Run `f` with exclusive access to the engine
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut TransportEngine<L>) -> R) -> R {
        f(&mut self.engine.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use omvp_io::MemoryLink;
    use omvp_protocol::{Flags, FrameCodec, SeqNumber};

    #[test]
    fn test_clones_share_engine() {
        let (host, mut device) = MemoryLink::pair();
        let transport = SharedTransport::new(TransportEngine::new(host, TransportConfig::default()));
        let other = transport.clone();

        let frame = FrameCodec::default()
            .encode(SeqNumber::new(0), 0, Flags::ACK, 0x10, b"ok")
            .unwrap();
        device.write_frame(&frame).unwrap();

        let reply = other.request(0x10, 0, None).unwrap();
        assert_eq!(reply.payload(), b"ok");
        assert_eq!(transport.stats().sent, 1);
        assert_eq!(transport.stats().received, 1);
        assert_eq!(
            transport.with_engine(|engine| engine.sequence()),
            SeqNumber::new(1)
        );
    }

    #[test]
    fn test_poll_events_drains() {
        let (host, mut device) = MemoryLink::pair();
        let engine = TransportEngine::new(host, TransportConfig::default());
        let transport = SharedTransport::new(engine);

        let codec = FrameCodec::default();
        for code in 0u16..3 {
            let frame = codec
                .encode(SeqNumber::new(0), 1, Flags::EVENT, 0x80, &code.to_le_bytes())
                .unwrap();
            device.write_frame(&frame).unwrap();
        }

        assert_eq!(transport.poll_events().unwrap(), None);
        assert_eq!(transport.stats().received, 3);
        assert_eq!(transport.with_engine(|e| e.link_mut().bytes_available().unwrap()), 0);
    }
}
