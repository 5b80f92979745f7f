//! Health report rendering.
//!
//! Two artifacts per run: a JSON health summary for dashboards and a YAML
//! zone list with broken endpoints removed, ready to paste into config.

use chrono::{DateTime, SecondsFormat, Utc};
use dnsbl_core::{FailureKind, HealthSummary, NetworkConnectivityResult, PrunedConfiguration, ZoneStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Health summary file name
pub const HEALTH_FILE: &str = "dnsbl-health.json";

/// Pruned configuration file name
pub const PRUNED_FILE: &str = "dnsbl-pruned.yaml";

/// Errors from report rendering or writing
#[derive(Error, Debug)]
pub enum ReportError {
    /// JSON rendering failed
    #[error("failed to render JSON report: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML rendering failed
    #[error("failed to render YAML report: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Writing a report file failed
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Target file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

type Result<T> = std::result::Result<T, ReportError>;

#[derive(Serialize)]
struct HealthReport<'a> {
    execution_summary: ExecutionSummary,
    dnsbl_health: Vec<ZoneReport<'a>>,
    network_connectivity: Option<ConnectivityReport>,
}

#[derive(Serialize)]
struct ExecutionSummary {
    timestamp: String,
    total_dnsbls: usize,
    broken_dnsbls: usize,
    network_issue_detected: bool,
    total_ip_checks: u64,
    execution_duration_ms: u64,
}

#[derive(Serialize)]
struct ZoneReport<'a> {
    zone: &'a str,
    status: ZoneStatus,
    checks_performed: u64,
    successful_checks: u64,
    failed_checks: u64,
    failure_rate: f64,
    failure_types: &'a BTreeMap<FailureKind, u64>,
}

#[derive(Serialize)]
struct ConnectivityReport {
    check_enabled: bool,
    cloudflare_reachable: Option<bool>,
    google_reachable: Option<bool>,
}

impl From<NetworkConnectivityResult> for ConnectivityReport {
    fn from(result: NetworkConnectivityResult) -> Self {
        Self {
            check_enabled: result.check_enabled(),
            cloudflare_reachable: result.cloudflare_reachable(),
            google_reachable: result.google_reachable(),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render the health summary as pretty JSON.
pub fn render_json(summary: &HealthSummary) -> Result<String> {
    let mut zones: Vec<ZoneReport<'_>> = summary
        .zone_health
        .iter()
        .map(|r| ZoneReport {
            zone: r.zone(),
            status: r.status(),
            checks_performed: r.checks_performed(),
            successful_checks: r.successful_checks(),
            failed_checks: r.failed_checks(),
            failure_rate: r.failure_rate(),
            failure_types: r.failure_types(),
        })
        .collect();
    zones.sort_by(|a, b| a.zone.cmp(b.zone));

    let report = HealthReport {
        execution_summary: ExecutionSummary {
            timestamp: timestamp(summary.timestamp),
            total_dnsbls: summary.total_zones,
            broken_dnsbls: summary.broken_zones,
            network_issue_detected: summary.network_issue_detected,
            total_ip_checks: summary.total_ip_checks,
            execution_duration_ms: summary.execution_duration_ms,
        },
        dnsbl_health: zones,
        network_connectivity: summary.network_connectivity.map(ConnectivityReport::from),
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

#[derive(Serialize)]
struct PrunedZones<'a> {
    dnsbl_zones: &'a [String],
}

/// Render the pruned zone list as YAML under a three-line comment header.
pub fn render_pruned_yaml(pruned: &PrunedConfiguration) -> Result<String> {
    let removed = if pruned.removed_zones.is_empty() {
        "None".to_string()
    } else {
        pruned.removed_zones.join(", ")
    };
    let body = serde_yaml::to_string(&PrunedZones {
        dnsbl_zones: &pruned.healthy_zones,
    })?;

    Ok(format!(
        "# Suggested DNSBL Configuration (Broken endpoints removed)\n\
         # Generated: {}\n\
         # Removed: {removed}\n\
         {body}",
        timestamp(pruned.generated_at)
    ))
}

/// Write both reports into `output_dir`, or print them when it is `None`.
/// Returns the files written.
pub async fn write_reports(
    summary: &HealthSummary,
    output_dir: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let json = render_json(summary)?;
    let pruned = PrunedConfiguration::from_records(&summary.zone_health, summary.timestamp);
    let yaml = render_pruned_yaml(&pruned)?;

    let Some(dir) = output_dir else {
        println!("{json}");
        println!();
        print!("{yaml}");
        return Ok(Vec::new());
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut written = Vec::with_capacity(2);
    for (name, content) in [(HEALTH_FILE, json), (PRUNED_FILE, yaml)] {
        let path = dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "wrote report");
        written.push(path);
    }
    Ok(written)
}
