//! Defines the structure and parsing logic for command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Holds the parsed CLI arguments.
///
/// Exactly one mode is expected per invocation; `--host` may additionally
/// carry `--pool-address` to reconcile a wallet in the same run.
#[derive(Parser, Debug)]
#[command(author, version, about = "Miner monitoring probe", long_about = None)]
pub struct Args {
    /// Hostname or IP of a single miner to check
    #[arg(long, conflicts_with_all = ["scan", "watch", "cleanup", "report"])]
    pub host: Option<String>,

    /// Scan a network range in CIDR notation (e.g. 192.168.1.0/24)
    #[arg(long, value_name = "CIDR", conflicts_with_all = ["watch", "cleanup", "report"])]
    pub scan: Option<String>,

    /// Watch ARP traffic for spoofing (requires capture privileges)
    #[arg(long, conflicts_with_all = ["cleanup", "report"])]
    pub watch: bool,

    /// Network interface for --watch (auto-detected when omitted)
    #[arg(long, requires = "watch")]
    pub iface: Option<String>,

    /// Remove history rows older than the retention window
    #[arg(long, conflicts_with = "report")]
    pub cleanup: bool,

    /// Print an aggregate report of stored state
    #[arg(long)]
    pub report: bool,

    /// Also reconcile this wallet address against the P2Pool observer
    #[arg(long, value_name = "ADDRESS", requires = "host")]
    pub pool_address: Option<String>,

    /// API port of the miner(s), overriding the config file
    #[arg(long)]
    pub port: Option<u16>,

    #[arg(
        short = 'c',
        long = "config",
        help = "Path to the TOML configuration file"
    )]
    pub config_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long = "log-file",
        help = "Path to the log file. If not set, logs will only be written to stdout."
    )]
    pub log_file: Option<PathBuf>,
}
