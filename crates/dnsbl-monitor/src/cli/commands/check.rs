//! `dnsbl-monitor check` - Probe one IP ad hoc.

use anyhow::{bail, Result};
use colored::Colorize;
use dnsbl_core::{aggregate_results, ProbeResult, ProbeStatus};
use dnsbl_probe::{check_ip, DnsLookup, ZoneProber};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;

use super::{system_lookup, Context};
use crate::cli::args::CheckArgs;
use crate::config::MonitorConfig;

#[derive(Serialize)]
struct CheckReport<'a> {
    ip: Ipv4Addr,
    listed: bool,
    listed_zones: Vec<String>,
    unknown_zones: Vec<String>,
    results: &'a [ProbeResult],
}

pub async fn execute(ctx: Context, args: CheckArgs) -> Result<()> {
    let config = check_config(&ctx, &args)?;
    let lookup = system_lookup(&config)?;
    let results = probe(lookup, &config, args.ip).await?;

    let aggregated = aggregate_results(&results);
    let report = CheckReport {
        ip: args.ip,
        listed: !aggregated.listed.is_empty(),
        listed_zones: aggregated.listed.to_vec(),
        unknown_zones: aggregated.unknown.to_vec(),
        results: &results,
    };

    if let Some(rendered) = ctx.output_format.render(&report)? {
        println!("{rendered}");
        return Ok(());
    }

    let verdict = if report.listed {
        "LISTED".red().bold()
    } else {
        "CLEAN".green().bold()
    };
    println!("{} {}", args.ip.to_string().cyan().bold(), verdict);
    for result in &results {
        let status = match result.status {
            ProbeStatus::Listed => "listed".red(),
            ProbeStatus::NotListed => "clean".green(),
            ProbeStatus::Unknown => "unknown".yellow(),
        };
        println!("  {:<32} {:<8} {}", result.zone, status, result.detail.dimmed());
    }
    Ok(())
}

/// Zones from `--zone` replace the configured ones.
fn check_config(ctx: &Context, args: &CheckArgs) -> Result<MonitorConfig> {
    let mut ctx = ctx.clone();
    if !args.zones.is_empty() {
        ctx.config.dns.zones.clone_from(&args.zones);
    }
    if ctx.config.dns.zones.iter().all(|z| z.trim().is_empty()) {
        bail!("no zones to check: pass --zone or configure [dns].zones");
    }
    ctx.validated()
}

async fn probe(
    lookup: Arc<dyn DnsLookup>,
    config: &MonitorConfig,
    ip: Ipv4Addr,
) -> Result<Vec<ProbeResult>> {
    let prober = ZoneProber::new(lookup).timeout(config.dns.timeout());
    Ok(check_ip(&prober, ip, &config.dns.zones, config.dns.concurrency).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use dnsbl_probe::{LookupOutcome, StaticLookup};

    fn ctx(zones: &[&str]) -> Context {
        let mut config = MonitorConfig::default();
        config.dns.zones = zones.iter().map(ToString::to_string).collect();
        Context {
            config,
            config_path: None,
            output_format: OutputFormat::Json,
            no_color: true,
        }
    }

    #[test]
    fn test_zone_flags_replace_config() {
        let args = CheckArgs {
            ip: Ipv4Addr::new(192, 0, 2, 1),
            zones: vec!["X.Example".into()],
        };
        let config = check_config(&ctx(&["a.example"]), &args).unwrap();
        assert_eq!(config.dns.zones, vec!["x.example"]);
    }

    #[test]
    fn test_no_zones_is_an_error() {
        let args = CheckArgs {
            ip: Ipv4Addr::new(192, 0, 2, 1),
            zones: Vec::new(),
        };
        assert!(check_config(&ctx(&[]), &args).is_err());
    }

    #[tokio::test]
    async fn test_probe_uses_all_zones() {
        let config = check_config(
            &ctx(&["a.example", "b.example"]),
            &CheckArgs {
                ip: Ipv4Addr::new(192, 0, 2, 1),
                zones: Vec::new(),
            },
        )
        .unwrap();
        let lookup = StaticLookup::new()
            .answer(
                "1.2.0.192.b.example",
                LookupOutcome::Addresses(vec![Ipv4Addr::new(127, 0, 0, 2)]),
            )
            .shared();

        let results = probe(lookup, &config, Ipv4Addr::new(192, 0, 2, 1)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, ProbeStatus::NotListed);
        assert_eq!(results[1].status, ProbeStatus::Listed);
    }
}
