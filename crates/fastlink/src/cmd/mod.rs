use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use fastlink::codec::{Codec, CodecConfig, PoolAllocator, DEFAULT_READ_BUFFER_SIZE};

use crate::exit::{codec_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a TCP echo server for the demo service.
    Echo(EchoArgs),
    /// Send a single demo message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, codec: &CodecArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, codec),
        Command::Send(args) => send::run(args, codec, format),
        Command::Version(args) => version::run(args),
    }
}

/// Codec tuning shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CodecArgs {
    /// Read-ahead buffer size per connection, in bytes.
    #[arg(
        long,
        value_name = "BYTES",
        env = "FASTLINK_READ_BUFFER_SIZE",
        default_value_t = DEFAULT_READ_BUFFER_SIZE,
        global = true
    )]
    pub read_buffer_size: usize,

    /// Recycle frame buffers through a bounded pool instead of the heap.
    #[arg(long, env = "FASTLINK_POOLED_BUFFERS", global = true)]
    pub pooled_buffers: bool,
}

impl CodecArgs {
    pub fn build<C>(&self) -> CliResult<Codec<C>> {
        let config = CodecConfig {
            read_buffer_size: self.read_buffer_size,
            ..CodecConfig::default()
        };
        let codec = Codec::new(config).map_err(|err| codec_error("codec setup failed", err))?;
        if self.pooled_buffers {
            return Ok(codec.with_allocator(Arc::new(PoolAllocator::new())));
        }
        Ok(codec)
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to listen on (e.g. 127.0.0.1:7000).
    pub addr: String,
    /// Exit after serving N connections.
    #[arg(long, value_name = "N")]
    pub max_connections: Option<usize>,
    /// Drop connections idle for longer than this (e.g. 30s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to.
    pub addr: String,
    /// Send a TEXT message.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub text: Option<String>,
    /// Send a RAW message from hex digits (e.g. 010203).
    #[arg(long, conflicts_with_all = ["text", "file"])]
    pub hex: Option<String>,
    /// Send a RAW message with the contents of a file.
    #[arg(long, conflicts_with_all = ["text", "hex"])]
    pub file: Option<std::path::PathBuf>,
    /// Wait for the echoed message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the echo when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
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
