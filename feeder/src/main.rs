//! pcstats-feeder: streams host CPU/GPU stats to the gauge strip.
//!
//! Every interval it samples CPU temperature, CPU load and GPU temperature
//! and writes one `cpu_temp,cpu_load,gpu_temp` line to the serial port.
//! Readings that are unavailable go out as `N/A`, which the strip shows
//! as 0. Write failures are logged and the port is reopened on the next
//! round.

mod link;
mod sample;
mod sensors;

use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};

use crate::link::SerialLink;
use crate::sensors::Sampler;

/// Stream CPU temperature, CPU load and GPU temperature to the gauge strip
#[derive(Parser, Debug)]
#[command(name = "pcstats-feeder")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Serial device, or `-` for stdout
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Line rate to configure on the port (0 opens it as-is, settings untouched)
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Seconds between samples
    #[arg(short, long, default_value = "2", value_parser = parse_interval)]
    interval: f64,

    /// Send a single line and exit
    #[arg(long)]
    once: bool,

    /// Log level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Parse a sampling interval: a positive, finite number of seconds.
fn parse_interval(s: &str) -> Result<f64> {
    let secs: f64 = s.trim().parse()?;
    if !(secs.is_finite() && secs > 0.0) {
        bail!("interval must be a positive number of seconds, got {s}");
    }
    Ok(secs)
}

/// `--baud 0` means: do not touch the line settings.
fn line_rate(baud: u32) -> Option<u32> { (baud != 0).then_some(baud) }

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Allow RUST_LOG to override the CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str())).init();

    info!("Starting pcstats-feeder v{}", env!("CARGO_PKG_VERSION"));

    let mut sampler = Sampler::new();
    let mut link = SerialLink::new(&cli.port, line_rate(cli.baud));
    let interval = Duration::from_secs_f64(cli.interval);

    if cli.once {
        let line = sampler.sample().to_string();
        link.send(&line)?;
        debug!("Sent: {line}");
        return Ok(());
    }

    info!("Sending to {} every {:.1}s", cli.port, cli.interval);
    loop {
        let line = sampler.sample().to_string();
        match link.send(&line) {
            Ok(()) => debug!("Sent: {line}"),
            Err(e) => warn!("{e:#}; will reconnect"),
        }
        thread::sleep(interval);
    }
}
