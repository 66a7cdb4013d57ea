use std::num::NonZeroUsize;
use std::time::Duration;

use clap::{Args, Subcommand};
use padlink_frame::DEFAULT_MAX_PACKET_SIZE;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;
use crate::sample::SampleMode;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream synthetic controller samples to a listener.
    Send(SendArgs),
    /// Accept producers and print the samples they send.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Listener address (host:port).
    #[arg(default_value = "127.0.0.1:8080")]
    pub addr: String,
    /// Samples per second.
    #[arg(long, default_value = "33", env = "PADLINK_HZ")]
    pub hz: f64,
    /// Send random values instead of a smooth wave.
    #[arg(long)]
    pub random: bool,
    /// Stop after producing N samples (skipped samples count).
    #[arg(long)]
    pub count: Option<NonZeroUsize>,
    /// Largest payload in bytes; bigger samples are skipped.
    #[arg(long, default_value_t = DEFAULT_MAX_PACKET_SIZE, env = "PADLINK_MAX_PACKET_SIZE")]
    pub max_packet_size: usize,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

impl SendArgs {
    pub fn mode(&self) -> SampleMode {
        if self.random {
            SampleMode::Random
        } else {
            SampleMode::Wave
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    #[arg(default_value = "127.0.0.1:8080")]
    pub addr: String,
    /// Exit after receiving N intact samples.
    #[arg(long)]
    pub count: Option<NonZeroUsize>,
    /// Largest payload in bytes a producer may send.
    #[arg(long, default_value_t = DEFAULT_MAX_PACKET_SIZE, env = "PADLINK_MAX_PACKET_SIZE")]
    pub max_packet_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
