//! Transport configuration

use omvp_protocol::{Capabilities, CrcSuite};
use std::time::Duration;

/// Settings a `TransportEngine` is built with
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Longest wait for a reply, restarted by events and fragments
    pub timeout: Duration,
    /// Sleep between link polls while waiting
    pub poll_interval: Duration,
    /// Pause before repeating a request the peer answered with BUSY
    pub busy_backoff: Duration,
    /// Initial capabilities
    pub caps: Capabilities,
    /// Checksum functions
    pub crc: CrcSuite,
    /// Probability of discarding a parsed packet (loss simulation)
    pub drop_rate: f64,
    /// Probability of not sending a requested ACK (loss simulation)
    pub ack_drop_rate: f64,
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_busy_backoff(mut self, backoff: Duration) -> Self {
        self.busy_backoff = backoff;
        self
    }

    pub fn with_caps(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_crc(mut self, crc: CrcSuite) -> Self {
        self.crc = crc;
        self
    }

    /// Set the simulated packet loss rate, clamped to `[0.0, 1.0]`
    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = clamp_rate(rate);
        self
    }

    /// Set the simulated ACK loss rate, clamped to `[0.0, 1.0]`
    pub fn with_ack_drop_rate(mut self, rate: f64) -> Self {
        self.ack_drop_rate = clamp_rate(rate);
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
            busy_backoff: Duration::from_millis(10),
            caps: Capabilities::default(),
            crc: CrcSuite::default(),
            drop_rate: 0.0,
            ack_drop_rate: 0.0,
        }
    }
}

pub(crate) fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.caps, Capabilities::default());
        assert_eq!(config.drop_rate, 0.0);
    }

    #[test]
    fn test_rates_clamped() {
        let config = TransportConfig::default()
            .with_drop_rate(1.5)
            .with_ack_drop_rate(-0.2);
        assert_eq!(config.drop_rate, 1.0);
        assert_eq!(config.ack_drop_rate, 0.0);

        let config = TransportConfig::default().with_drop_rate(f64::NAN);
        assert_eq!(config.drop_rate, 0.0);
    }
}
