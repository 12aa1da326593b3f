//! Configuration file support for OMVP CLI tools

use omvp::TransportConfig;
use omvp_protocol::{Capabilities, DEFAULT_MAX_PAYLOAD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Link endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Local bind address
    #[serde(default = "default_local")]
    pub local: SocketAddr,
    /// Peer address; learned from the first datagram when absent
    pub remote: Option<SocketAddr>,
}

fn default_local() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            local: default_local(),
            remote: None,
        }
    }
}

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Verify checksums
    pub crc: bool,
    /// Enforce sequence numbers
    pub seq: bool,
    /// Send and request acknowledgements
    pub ack: bool,
    /// Largest payload per packet
    pub max_payload: u16,
    /// Simulated packet loss rate
    pub drop_rate: f64,
    /// Simulated ACK loss rate
    pub ack_drop_rate: f64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportSettings {
            timeout_ms: 1000,
            crc: true,
            seq: true,
            ack: true,
            max_payload: DEFAULT_MAX_PAYLOAD,
            drop_rate: 0.0,
            ack_drop_rate: 0.0,
        }
    }
}

impl TransportSettings {
    /// Reply timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn caps(&self) -> Capabilities {
        Capabilities::new(self.crc, self.seq, self.ack, self.max_payload)
    }

    /// Build the engine configuration
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::default()
            .with_timeout(self.timeout())
            .with_caps(self.caps())
            .with_drop_rate(self.drop_rate)
            .with_ack_drop_rate(self.ack_drop_rate)
    }
}

/// Device emulator behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorSettings {
    /// Period of unsolicited events; 0 disables them
    pub event_interval_ms: u64,
    /// Channel events are reported on
    pub event_channel: u8,
    /// Payload bytes per fragment for fragmented replies
    pub fragment_size: usize,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        EmulatorSettings {
            event_interval_ms: 1000,
            event_channel: 0,
            fragment_size: 64,
        }
    }
}

impl EmulatorSettings {
    /// Event period, `None` when disabled
    pub fn event_interval(&self) -> Option<Duration> {
        (self.event_interval_ms > 0).then(|| Duration::from_millis(self.event_interval_ms))
    }
}

/// Combined configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub emulator: EmulatorSettings,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("drop_rate", self.transport.drop_rate),
            ("ack_drop_rate", self.transport.ack_drop_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within 0.0..=1.0, got {}",
                    name, rate
                )));
            }
        }
        if self.transport.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".into()));
        }
        if self.emulator.fragment_size == 0 {
            return Err(ConfigError::Invalid("fragment_size must be positive".into()));
        }
        if let Some(remote) = self.link.remote {
            if remote.is_ipv4() != self.link.local.is_ipv4() {
                return Err(ConfigError::Invalid(format!(
                    "local {} and remote {} use different address families",
                    self.link.local, remote
                )));
            }
        }
        Ok(())
    }

    /// Example configuration for a probe talking to a local emulator
    pub fn example() -> Self {
        Config {
            link: LinkConfig {
                local: SocketAddr::from(([127, 0, 0, 1], 0)),
                remote: Some(SocketAddr::from(([127, 0, 0, 1], 9500))),
            },
            transport: TransportSettings::default(),
            emulator: EmulatorSettings::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
