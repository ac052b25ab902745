//! CLI argument definitions for gatewatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// gatewatch firewall telemetry daemon.
///
/// Receives UDP logs from each configured firewall appliance on its own
/// port and keeps live per-appliance statistics for the dashboard.
#[derive(Parser, Debug)]
#[command(name = "gatewatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to gatewatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/gatewatch/gatewatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
