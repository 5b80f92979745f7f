//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::output::OutputFormat;

/// Check sending IPs against DNSBL zones
///
/// Probes every stored IP against the configured zones, throttles newly
/// listed IPs, restores recovered ones, and reports which zones are broken.
#[derive(Parser, Debug)]
#[command(name = "dnsbl-monitor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: ./dnsbl-monitor.toml, then the user config dir)
    #[arg(short, long, env = "DNSBL_MONITOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format for command results
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Log format (default: json when stderr is not a terminal)
    #[arg(long, env = "LOG_FORMAT", global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one full monitoring pass over every stored IP
    Run(RunArgs),

    /// Probe a single IP without touching the store or tickets
    Check(CheckArgs),

    /// Check whether public DNS resolvers answer
    Connectivity,

    /// Print the effective configuration as TOML
    Config,
}

// ============================================================================
// Run command
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Probe and report, but write nothing and open no tickets
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the public-resolver check
    #[arg(long)]
    pub no_network_check: bool,

    /// Write health reports here instead of printing them
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Correlation id for this run's logs (default: generated)
    #[arg(long, env = "DNSBL_RUN_ID", value_name = "ID")]
    pub run_id: Option<String>,
}

// ============================================================================
// Check command
// ============================================================================

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// IPv4 address to check
    pub ip: Ipv4Addr,

    /// Zone to query (repeatable; defaults to the configured zones)
    #[arg(short, long = "zone", value_name = "ZONE")]
    pub zones: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::parse_from([
            "dnsbl-monitor",
            "run",
            "--dry-run",
            "--report-dir",
            "out",
            "--run-id",
            "cron-42",
            "-v",
        ]);
        assert!(cli.verbose);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        assert!(!args.no_network_check);
        assert_eq!(args.report_dir, Some(PathBuf::from("out")));
        assert_eq!(args.run_id.as_deref(), Some("cron-42"));
    }

    #[test]
    fn test_check_zones() {
        let cli = Cli::parse_from([
            "dnsbl-monitor",
            "check",
            "192.0.2.1",
            "--zone",
            "a.example",
            "-z",
            "b.example",
            "-o",
            "json",
        ]);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.ip, Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(args.zones, vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_check_rejects_bad_ip() {
        assert!(Cli::try_parse_from(["dnsbl-monitor", "check", "999.1.1.1"]).is_err());
    }
}
