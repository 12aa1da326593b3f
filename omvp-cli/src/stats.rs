//! Statistics display and formatting

use omvp_protocol::Statistics;
use std::io::Write;
use std::time::Duration;

/// Format a packet rate in human-readable form
pub fn format_rate(packets: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "0.0 pkt/s".to_string();
    }
    format!("{:.1} pkt/s", packets as f64 / secs)
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else if secs > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Render transport statistics as a table
pub fn format_stats_table(stats: &Statistics, elapsed: Duration) -> String {
    let rows = [
        ("Sent", stats.sent.to_string()),
        ("Received", stats.received.to_string()),
        ("Checksum failures", stats.checksum_failures.to_string()),
        ("Sequence failures", stats.sequence_failures.to_string()),
        ("Error rate", format!("{:.2}%", stats.error_rate() * 100.0)),
        ("Receive rate", format_rate(stats.received, elapsed)),
        ("Elapsed", format_duration(elapsed)),
    ];

    let mut out = String::new();
    out.push_str("┌────────────────────┬──────────────────┐\n");
    out.push_str("│ TRANSPORT STATISTICS                  │\n");
    out.push_str("├────────────────────┬──────────────────┤\n");
    for (label, value) in rows {
        out.push_str(&format!("│ {:<18} │ {:>16} │\n", label, value));
    }
    out.push_str("└────────────────────┴──────────────────┘");
    out
}

/// Display transport statistics
pub fn display_stats(stats: &Statistics, elapsed: Duration) {
    println!("\n{}", format_stats_table(stats, elapsed));
}

/// One-line summary
pub fn format_compact_stats(stats: &Statistics, elapsed: Duration) -> String {
    format!(
        "[{:>8}] Sent: {} | Received: {} | CRC errors: {} | Seq errors: {}",
        format_duration(elapsed),
        stats.sent,
        stats.received,
        stats.checksum_failures,
        stats.sequence_failures
    )
}

/// Display compact stats on one line (for continuous updates)
pub fn display_compact_stats(stats: &Statistics, elapsed: Duration) {
    print!("\r{}         ", format_compact_stats(stats, elapsed));
    let _ = std::io::stdout().flush();
}
