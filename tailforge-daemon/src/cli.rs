//! CLI argument definitions for tailforge-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Tailforge log ingestion daemon.
///
/// Tails configured log sources, evaluates grok/conditional rules per
/// line, and accumulates forwarded logs and typed metrics for the
/// exporter layer.
#[derive(Parser, Debug)]
#[command(name = "tailforge-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to tailforge.toml configuration file.
    #[arg(short, long, default_value = "/etc/tailforge/tailforge.toml")]
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

    /// Validate configuration and resources, then exit without starting.
    #[arg(long)]
    pub validate: bool,
}
