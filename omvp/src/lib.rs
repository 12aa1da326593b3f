//! OMVP - reliable framed transport
//!
//! Request/reply messaging over a byte link with per-packet checksums,
//! sequence numbering, acknowledgement, fragment reassembly and
//! asynchronous events.
//!
//! ```no_run
//! use omvp::{TransportConfig, TransportEngine};
//! use omvp::io::MemoryLink;
//!
//! let (host, _device) = MemoryLink::pair();
//! let mut engine = TransportEngine::new(host, TransportConfig::default())
//!     .with_event_handler(|channel, code| println!("event {} on {}", code, channel));
//!
//! let reply = engine.request(0x10, 0, Some(b"ping"));
//! ```

pub use omvp_io as io;
pub use omvp_protocol as protocol;

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod shared;

pub use config::TransportConfig;
pub use engine::{Message, Reply, TransportEngine};
pub use error::TransportError;
pub use event::{event_code, EventHandler};
pub use shared::SharedTransport;

// Re-export commonly used types
pub use protocol::{Capabilities, Flags, Packet, SeqNumber, Statistics, Status};
