//! Command-line argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// cleannet - DNS filtering engine for tunnel interfaces
///
/// Intercepts DNS queries read from an established tunnel device, answers
/// block-listed domains with NXDOMAIN, and proxies everything else through
/// a single upstream round trip.
#[derive(Parser, Debug)]
#[command(name = "cleannet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format for logs
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Log file path
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the interception engine against an established tunnel
    Run(RunArgs),
    /// Check a domain against a block list without running the engine
    Check(CheckArgs),
}

/// Arguments for the run command
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Inherited file descriptor of the established tunnel device
    #[arg(long, value_name = "FD")]
    pub tun_fd: i32,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Block-list file path (one pattern per line, # comments)
    #[arg(short = 'b', long, value_name = "FILE")]
    pub blocklist: Option<PathBuf>,

    /// Upstream resolver address
    #[arg(long, value_name = "IP")]
    pub upstream: Option<IpAddr>,

    /// Upstream receive timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// Arguments for the check command
#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Block-list file path
    #[arg(short = 'b', long, value_name = "FILE")]
    pub blocklist: PathBuf,

    /// Domain to check
    pub domain: String,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// Structured JSON
    Json,
    /// Compact single-line text
    Compact,
}
