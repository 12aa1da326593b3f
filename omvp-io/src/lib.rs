//! OMVP I/O and Platform Abstraction
//!
//! This crate provides the byte links the transport runs over (an
//! in-process pair and a UDP datagram link) and timing utilities.

pub mod link;
pub mod socket;
pub mod time;

pub use link::{Link, MemoryLink};
pub use socket::{LinkError, UdpLink};
pub use time::Timer;
