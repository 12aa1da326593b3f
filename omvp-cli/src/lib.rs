//! OMVP CLI Library
//!
//! Shared functionality for the OMVP command-line tools.

pub mod config;
pub mod emulator;
pub mod stats;

pub use config::{Config, ConfigError, EmulatorSettings, LinkConfig, TransportSettings};
pub use emulator::{Emulator, EVENT_OPCODE, OPCODE_BUSY, OPCODE_FRAGMENTED};
pub use stats::{display_compact_stats, display_stats, format_duration, format_stats_table};

use tracing_subscriber::EnvFilter;

/// Log filter for the binaries: `RUST_LOG` when set, else `info` (`debug`
/// with `verbose`)
pub fn log_filter(verbose: bool) -> EnvFilter {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(directives.as_deref(), verbose)
}

fn filter_from(directives: Option<&str>, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// Parse a hex string such as `"de ad:be-ef"` or `"0xDEADBEEF"` into bytes
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<char> = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-' | '_'))
        .collect();

    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {:?}", input));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = pair[0].to_digit(16);
            let lo = pair[1].to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(format!("invalid hex digit in {:?}", input)),
            }
        })
        .collect()
}

/// Parse a number in decimal or `0x` hexadecimal
pub fn parse_u8(input: &str) -> Result<u8, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|e| format!("invalid byte value {:?}: {}", input, e))
}
