//! Transport statistics

/// Counters kept for the lifetime of a transport.
///
/// All counters only ever grow; they are reset by building a new transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Packets written to the link
    pub sent: u64,
    /// Validated packets taken off the link
    pub received: u64,
    /// Headers or payloads rejected for a bad CRC
    pub checksum_failures: u64,
    /// Headers rejected for an unexpected sequence number
    pub sequence_failures: u64,
}

impl Statistics {
    /// Total number of local parse rejections that were counted
    pub fn rejected(&self) -> u64 {
        self.checksum_failures + self.sequence_failures
    }

    /// Fraction of packets rejected against all packets seen
    pub fn error_rate(&self) -> f64 {
        let seen = self.received + self.rejected();
        if seen == 0 {
            0.0
        } else {
            self.rejected() as f64 / seen as f64
        }
    }
}
