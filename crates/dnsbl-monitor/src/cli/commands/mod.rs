//! Command implementations.

pub mod check;
pub mod config;
pub mod connectivity;
pub mod run;

use anyhow::{Context as _, Result};
use dnsbl_probe::{DnsLookup, HickoryLookup};
use dnsbl_tickets::{JiraClient, NoopTracker, TicketTracker};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::MonitorConfig;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration, not yet validated
    pub config: MonitorConfig,

    /// File the configuration was read from, if any
    pub config_path: Option<PathBuf>,

    /// Output format
    pub output_format: OutputFormat,

    /// Disable colors
    pub no_color: bool,
}

impl Context {
    /// Validated copy of the configuration.
    pub fn validated(&self) -> Result<MonitorConfig> {
        let mut config = self.config.clone();
        config.validate()?;
        Ok(config)
    }
}

/// Resolver for DNSBL queries, built from the system configuration.
pub fn system_lookup(config: &MonitorConfig) -> Result<Arc<dyn DnsLookup>> {
    let lookup = HickoryLookup::system(config.dns.timeout())
        .context("could not set up the DNS resolver")?;
    Ok(Arc::new(lookup))
}

/// Ticket tracker for this run: Jira when configured and not a dry run,
/// otherwise a tracker that only logs.
pub fn ticket_tracker(config: &MonitorConfig) -> Result<Arc<dyn TicketTracker>> {
    match &config.jira {
        Some(jira) if !config.dry_run => {
            let client = JiraClient::builder(&jira.server, &jira.user, &jira.api_token, &jira.project)
                .issue_type(&jira.issue_type)
                .dns_failure_issue_type(&jira.dns_failure_issue_type)
                .excluded_statuses(jira.excluded_statuses.clone())
                .build()
                .context("could not set up the Jira client")?;
            Ok(Arc::new(client))
        }
        _ => {
            if config.jira.is_none() {
                info!("Jira not configured, ticket actions will only be logged");
            }
            Ok(Arc::new(NoopTracker::new()))
        }
    }
}
