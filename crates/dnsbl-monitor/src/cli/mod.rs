//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use std::io::IsTerminal;

use crate::config::MonitorConfig;
use crate::logging::{init_tracing, LogFormat};
use crate::output::OutputFormat;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_format = cli.log_format.unwrap_or_else(|| {
        if std::io::stderr().is_terminal() {
            LogFormat::Compact
        } else {
            LogFormat::Json
        }
    });
    init_tracing(log_format, cli.quiet, cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config_path = MonitorConfig::resolve_path(cli.config.as_deref());
    let config = MonitorConfig::load(cli.config.as_deref())?;

    let ctx = commands::Context {
        config,
        config_path,
        output_format: cli.output.unwrap_or(OutputFormat::Pretty),
        no_color: cli.no_color,
    };

    match cli.command {
        Commands::Run(args) => commands::run::execute(ctx, args).await,
        Commands::Check(args) => commands::check::execute(ctx, args).await,
        Commands::Connectivity => commands::connectivity::execute(ctx).await,
        Commands::Config => commands::config::execute(&ctx),
    }
}
