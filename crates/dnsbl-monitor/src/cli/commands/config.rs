//! `dnsbl-monitor config` - Show the effective configuration.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::output::OutputFormat;

pub fn execute(ctx: &Context) -> Result<()> {
    let config = ctx.config.redacted();

    match ctx.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&config)?),
        OutputFormat::Pretty => {
            let source = ctx.config_path.as_ref().map_or_else(
                || "defaults and environment".to_string(),
                |p| p.display().to_string(),
            );
            eprintln!("{} {source}", "# Loaded from:".dimmed());
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    if let Err(e) = ctx.config.clone().validate() {
        eprintln!("{} {e}", "warning:".yellow().bold());
    }
    Ok(())
}
