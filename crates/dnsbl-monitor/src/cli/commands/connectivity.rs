//! `dnsbl-monitor connectivity` - Public resolver reachability.

use anyhow::Result;
use colored::Colorize;
use dnsbl_core::NetworkConnectivityResult;
use dnsbl_probe::check_connectivity;
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
struct ConnectivityReport {
    cloudflare_reachable: bool,
    google_reachable: bool,
    all_unreachable: bool,
}

impl From<NetworkConnectivityResult> for ConnectivityReport {
    fn from(result: NetworkConnectivityResult) -> Self {
        Self {
            cloudflare_reachable: result.cloudflare_reachable().unwrap_or(false),
            google_reachable: result.google_reachable().unwrap_or(false),
            all_unreachable: result.all_unreachable(),
        }
    }
}

pub async fn execute(ctx: Context) -> Result<()> {
    let result = check_connectivity(ctx.config.dns.timeout()).await;
    let report = ConnectivityReport::from(result);

    if let Some(rendered) = ctx.output_format.render(&report)? {
        println!("{rendered}");
        return Ok(());
    }

    let mark = |ok: bool| if ok { "reachable".green() } else { "unreachable".red() };
    println!("{}", "Public DNS resolvers:".bold());
    println!("  {:<22} {}", "Cloudflare (1.1.1.1)", mark(report.cloudflare_reachable));
    println!("  {:<22} {}", "Google (8.8.8.8)", mark(report.google_reachable));
    if report.all_unreachable {
        println!();
        println!("{}", "Outbound DNS appears to be down.".red().bold());
    }
    Ok(())
}
