//! OMVP Probe - one-shot request against an OMVP device
//!
//! Sends a single request over UDP, prints the reply, listens for events for
//! a while and reports transport statistics.

use anyhow::Context;
use clap::Parser;
use omvp::io::UdpLink;
use omvp::{Reply, TransportEngine};
use omvp_cli::{display_stats, log_filter, parse_hex, parse_u8, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "omvp-probe")]
#[command(about = "Send one OMVP request and print the reply", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write an example configuration to this path and exit
    #[arg(long)]
    write_example: Option<PathBuf>,

    /// Device address (host:port)
    #[arg(short, long)]
    remote: Option<SocketAddr>,

    /// Local bind address
    #[arg(short, long)]
    local: Option<SocketAddr>,

    /// Request opcode (decimal or 0x-prefixed hex)
    #[arg(short, long, value_parser = parse_u8, default_value = "0x10")]
    opcode: u8,

    /// Request channel
    #[arg(long, value_parser = parse_u8, default_value = "0")]
    channel: u8,

    /// Request payload as hex
    #[arg(short, long, default_value = "")]
    data: String,

    /// Synchronize with the device before the request
    #[arg(long)]
    sync: bool,

    /// Attempts while the device answers BUSY
    #[arg(long, default_value = "1")]
    attempts: usize,

    /// Reply timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Keep listening for events this long after the reply, in milliseconds
    #[arg(long, default_value = "0")]
    listen_ms: u64,

    /// Disable checksum verification
    #[arg(long)]
    no_crc: bool,

    /// Disable sequence enforcement
    #[arg(long)]
    no_seq: bool,

    /// Disable acknowledgements
    #[arg(long)]
    no_ack: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.verbose))
        .init();

    if let Some(path) = &args.write_example {
        Config::example()
            .to_file(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Example configuration written to {}", path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(remote) = args.remote {
        config.link.remote = Some(remote);
    }
    if let Some(local) = args.local {
        config.link.local = local;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.transport.timeout_ms = timeout_ms;
    }
    config.transport.crc &= !args.no_crc;
    config.transport.seq &= !args.no_seq;
    config.transport.ack &= !args.no_ack;

    let remote = config
        .link
        .remote
        .context("a device address is required (--remote or [link] remote)")?;
    let local = if args.local.is_none() && config.link.local.is_ipv4() != remote.is_ipv4() {
        SocketAddr::new(
            if remote.is_ipv4() {
                [0, 0, 0, 0].into()
            } else {
                std::net::Ipv6Addr::UNSPECIFIED.into()
            },
            0,
        )
    } else {
        config.link.local
    };
    config.link.local = local;
    config.validate()?;

    let payload = parse_hex(&args.data).map_err(anyhow::Error::msg)?;

    let link = UdpLink::connect(local, remote)?;
    tracing::info!("Probe bound to {} talking to {}", link.local_addr()?, remote);

    let mut engine = TransportEngine::new(link, config.transport.transport_config())
        .with_event_handler(|channel, code| {
            println!("event: channel {} code 0x{:04X}", channel, code);
        });

    let start = Instant::now();

    if args.sync {
        engine.sync().context("synchronizing with device")?;
        tracing::info!("Synchronized with device");
    }

    let data = (!payload.is_empty()).then_some(payload.as_slice());
    let reply = match engine.request_with_retry(args.opcode, args.channel, data, args.attempts) {
        Err(e) if e.is_retryable() && args.attempts > 1 => {
            tracing::warn!("Request failed ({}), resynchronizing and retrying", e);
            engine.sync().context("resynchronizing with device")?;
            engine.request_with_retry(args.opcode, args.channel, data, args.attempts - 1)
        }
        result => result,
    }
    .context("request failed")?;

    match &reply {
        Reply::Data(bytes) => {
            let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            println!("reply: {} bytes: {}", bytes.len(), hex.join(" "));
        }
        Reply::Ack => println!("reply: ack"),
        Reply::Busy => println!("reply: device busy after {} attempt(s)", args.attempts),
    }

    if args.listen_ms > 0 {
        let window = Duration::from_millis(args.listen_ms);
        let listen_start = Instant::now();
        while listen_start.elapsed() < window {
            if let Some(late) = engine.recv_packet(true)? {
                tracing::warn!("Unsolicited reply ignored: {:?}", late);
            }
            std::thread::sleep(engine.config().poll_interval);
        }
    }

    display_stats(&engine.stats(), start.elapsed());
    Ok(())
}
