//! Asynchronous event delivery

/// Receives EVENT packets while the transport waits for replies.
///
/// Called synchronously from inside the receive loop, so implementations
/// must return quickly.
pub trait EventHandler {
    fn on_event(&mut self, channel: u8, code: u16);
}

impl<F> EventHandler for F
where
    F: FnMut(u8, u16),
{
    fn on_event(&mut self, channel: u8, code: u16) {
        self(channel, code)
    }
}

/// Event code carried by an EVENT payload: little-endian `u16`,
/// `0xFFFF` when the payload is empty
pub fn event_code(payload: &[u8]) -> u16 {
    match payload {
        [] => 0xFFFF,
        [lo] => *lo as u16,
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
    }
}
