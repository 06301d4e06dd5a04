use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use qlink_config::{LoaderConfig, QueueSet};
use qlink_transport::{DEFAULT_ADDRESS, DEFAULT_CONNECT_ATTEMPTS};

use crate::exit::{config_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod check;
pub mod loopback;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a queue spec file and print its queues.
    Check(CheckArgs),
    /// Run a device endpoint that echoes each h2f queue on the matching f2h queue.
    Serve(ServeArgs),
    /// Run a host endpoint: send one item, optionally wait for one back.
    Send(SendArgs),
    /// Run host and device in-process and report per-queue statistics.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Check(args) => check::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Queue spec file (JSON array of queue descriptors).
    pub spec: PathBuf,
    /// Skip the structural JSON Schema check.
    #[arg(long)]
    pub no_schema: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Queue spec file shared with the host.
    pub spec: PathBuf,
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    pub listen: String,
    /// Send a NOOP after this much idle time (e.g. 1s, 250ms).
    #[arg(long)]
    pub keepalive: Option<String>,
    /// Exit after the first connection ends.
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Queue spec file shared with the device.
    pub spec: PathBuf,
    /// h2f queue to send on.
    #[arg(long, short = 'q')]
    pub queue: usize,
    /// Item bytes as hex; length must equal the queue width.
    #[arg(long)]
    pub hex: String,
    /// Device address.
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    pub connect: String,
    /// Connection attempts, one second apart.
    #[arg(long, default_value_t = DEFAULT_CONNECT_ATTEMPTS)]
    pub attempts: u32,
    /// Wait for one item on this f2h queue and print it.
    #[arg(long)]
    pub wait_queue: Option<usize>,
    /// Maximum time for sending and for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Queue spec file.
    pub spec: PathBuf,
    /// Items to push through every h2f queue.
    #[arg(long, default_value_t = 100)]
    pub items: usize,
    /// Give up after this long (e.g. 10s).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn load_queue_set(path: &Path, check_schema: bool) -> CliResult<QueueSet> {
    let config = LoaderConfig {
        check_schema,
        ..LoaderConfig::default()
    };
    let queues = QueueSet::from_path_with_config(path, &config)
        .map_err(|err| config_error(&format!("invalid queue spec {}", path.display()), err))?;
    tracing::debug!(
        h2f = queues.h2f().len(),
        f2h = queues.f2h().len(),
        "queue spec loaded"
    );
    Ok(queues)
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
