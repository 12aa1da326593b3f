//! OMVP Emulator - device side of an OMVP link
//!
//! Listens on UDP and answers requests the way a simple device would:
//! echoes payloads, answers synchronization, reports BUSY for opcode 0xFE,
//! fragments replies for opcode 0xFD and emits periodic events.

use anyhow::Context;
use clap::Parser;
use omvp::io::UdpLink;
use omvp::TransportEngine;
use omvp_cli::{display_stats, log_filter, Config, Emulator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "omvp-emulator")]
#[command(about = "Emulate an OMVP device over UDP", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Event period in milliseconds (0 disables events)
    #[arg(long)]
    event_interval_ms: Option<u64>,

    /// Payload bytes per fragment in fragmented replies
    #[arg(long)]
    fragment_size: Option<usize>,

    /// Simulated packet loss rate
    #[arg(long)]
    drop_rate: Option<f64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.verbose))
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(listen) = args.listen {
        config.link.local = listen;
    }
    if let Some(interval) = args.event_interval_ms {
        config.emulator.event_interval_ms = interval;
    }
    if let Some(size) = args.fragment_size {
        config.emulator.fragment_size = size;
    }
    if let Some(rate) = args.drop_rate {
        config.transport.drop_rate = rate;
    }
    // Replies double as acknowledgements
    config.transport.ack = false;
    config.validate()?;

    let link = match config.link.remote {
        Some(remote) => UdpLink::connect(config.link.local, remote)?,
        None => UdpLink::bind(config.link.local)?,
    };
    tracing::info!("Emulator listening on {}", link.local_addr()?);

    let engine = TransportEngine::new(link, config.transport.transport_config());
    let mut emulator = Emulator::new(engine, config.emulator.clone());

    let stop = Arc::new(AtomicBool::new(false));
    if let Some(secs) = args.duration {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            stop.store(true, Ordering::Relaxed);
        });
    }

    let start = Instant::now();
    let served = emulator.run_until(&stop)?;

    println!("Served {} request(s)", served);
    display_stats(&emulator.engine().stats(), start.elapsed());
    Ok(())
}
