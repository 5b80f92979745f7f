//! `dnsbl-monitor run` - One full monitoring pass.

use anyhow::{Context as _, Result};
use colored::Colorize;
use dnsbl_core::RunContext;
use std::sync::Arc;

use super::{system_lookup, ticket_tracker, Context};
use crate::cli::args::RunArgs;
use crate::config::MonitorConfig;
use crate::monitor::{Monitor, RunOutcome};
use crate::output::OutputFormat;
use crate::store::JsonFileStore;

pub async fn execute(ctx: Context, args: RunArgs) -> Result<()> {
    let config = run_config(&ctx, &args)?;

    let store = JsonFileStore::open(&config.store.path)
        .await
        .with_context(|| format!("could not open IP store {}", config.store.path.display()))?;
    let tickets = ticket_tracker(&config)?;
    let lookup = system_lookup(&config)?;

    let monitor = Monitor::new(config.clone(), Arc::new(store), tickets, lookup);
    let outcome = monitor.run_with(run_context(&args)).await?;

    // Without a report directory the reports already went to stdout.
    if config.report.output_dir.is_some() {
        print_outcome(&ctx, &outcome)?;
    }
    Ok(())
}

/// Overlay the run flags on the loaded configuration and validate it.
fn run_config(ctx: &Context, args: &RunArgs) -> Result<MonitorConfig> {
    let mut ctx = ctx.clone();
    if args.dry_run {
        ctx.config.dry_run = true;
    }
    if args.no_network_check {
        ctx.config.dns.network_check = false;
    }
    if let Some(dir) = &args.report_dir {
        ctx.config.report.output_dir = Some(dir.clone());
    }
    ctx.validated()
}

fn run_context(args: &RunArgs) -> RunContext {
    args.run_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(RunContext::new, RunContext::with_id)
}

fn print_outcome(ctx: &Context, outcome: &RunOutcome) -> Result<()> {
    if let Some(rendered) = ctx.output_format.render(&serde_json::json!({
        "run_id": outcome.context.run_id,
        "stats": outcome.stats,
        "broken_zones": outcome.summary.broken_zone_names(),
        "network_issue_detected": outcome.summary.network_issue_detected,
        "reports": outcome.report_files,
    }))? {
        println!("{rendered}");
        return Ok(());
    }

    let stats = &outcome.stats;
    println!("{} {}", "Run".bold(), outcome.context.run_id.dimmed());
    println!("  {:<18} {}", "IPs checked:", stats.total);
    println!("  {:<18} {}", "Listed:", stats.listed.to_string().red());
    println!("  {:<18} {}", "Cleaned:", stats.cleaned.to_string().green());
    println!("  {:<18} {}", "Unchanged:", stats.unchanged);
    println!(
        "  {:<18} {} created, {} updated",
        "Tickets:", stats.tickets_created, stats.tickets_updated
    );
    if stats.ticket_failures > 0 || stats.store_failures > 0 {
        println!(
            "  {:<18} {} ticket, {} store",
            "Failures:".yellow(),
            stats.ticket_failures,
            stats.store_failures
        );
    }

    let broken = outcome.summary.broken_zone_names();
    if broken.is_empty() {
        println!("  {:<18} {}", "Zones:", "all healthy".green());
    } else {
        println!(
            "  {:<18} {} of {} broken: {}",
            "Zones:",
            broken.len(),
            outcome.summary.total_zones,
            broken.join(", ").red()
        );
    }
    if outcome.summary.network_issue_detected {
        println!("  {}", "DNS infrastructure failure detected".red().bold());
    }
    for path in &outcome.report_files {
        println!("  {:<18} {}", "Report:", path.display());
    }
    println!("  {:<18} {} ms", "Duration:", stats.duration_ms);
    Ok(())
}
