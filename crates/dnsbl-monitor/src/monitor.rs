//! One monitoring run: probe every IP, apply transitions, report health.

use dnsbl_core::{
    determine_transition, CoreError, HealthSummary, HealthTracker, IpState, NetworkConnectivityResult,
    RunContext, StateTransition, TransitionKind,
};
use dnsbl_probe::{check_connectivity, check_connectivity_with, check_ip, DnsLookup, ProbeError, ZoneProber};
use dnsbl_tickets::TicketTracker;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::MonitorConfig;
use crate::report::{write_reports, ReportError};
use crate::store::{IpStore, StoreError};

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The IP list could not be loaded
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Probing was misconfigured
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Health tracking was misconfigured
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Reports could not be written
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// IPs examined
    pub total: u64,
    /// Newly listed or zone-changed IPs
    pub listed: u64,
    /// IPs that recovered
    pub cleaned: u64,
    /// IPs with no change
    pub unchanged: u64,
    /// Issues opened
    pub tickets_created: u64,
    /// Issues commented on
    pub tickets_updated: u64,
    /// Ticket calls that failed
    pub ticket_failures: u64,
    /// Store writes that failed
    pub store_failures: u64,
    /// Wall time of the run
    pub duration_ms: u64,
}

/// What happened on the ticket side for one IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketAction {
    /// Nothing to do
    NoAction,
    /// Skipped because of dry-run
    DryRun,
    /// Opened a new issue
    Created(String),
    /// Commented on an existing issue
    Updated(String),
    /// The ticket call failed
    Failed,
}

impl TicketAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "no_action",
            Self::DryRun => "dry_run",
            Self::Created(_) => "created_issue",
            Self::Updated(_) => "updated_issue",
            Self::Failed => "failed",
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Run identity
    pub context: RunContext,
    /// Counters
    pub stats: RunStats,
    /// Zone health
    pub summary: HealthSummary,
    /// Report files written, empty when printed to stdout
    pub report_files: Vec<PathBuf>,
}

type ConnectivityPair = (Arc<dyn DnsLookup>, Arc<dyn DnsLookup>);

/// Drives one monitoring run over injected collaborators.
pub struct Monitor {
    config: MonitorConfig,
    store: Arc<dyn IpStore>,
    tickets: Arc<dyn TicketTracker>,
    lookup: Arc<dyn DnsLookup>,
    connectivity: Option<ConnectivityPair>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("zones", &self.config.dns.zones)
            .field("dry_run", &self.config.dry_run)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a monitor. `config` should already be validated.
    #[must_use]
    pub fn new(
        config: MonitorConfig,
        store: Arc<dyn IpStore>,
        tickets: Arc<dyn TicketTracker>,
        lookup: Arc<dyn DnsLookup>,
    ) -> Self {
        Self {
            config,
            store,
            tickets,
            lookup,
            connectivity: None,
        }
    }

    /// Use these lookups for the public-resolver check instead of
    /// 1.1.1.1 and 8.8.8.8.
    #[must_use]
    pub fn with_connectivity_lookups(
        mut self,
        cloudflare: Arc<dyn DnsLookup>,
        google: Arc<dyn DnsLookup>,
    ) -> Self {
        self.connectivity = Some((cloudflare, google));
        self
    }

    /// Run once under a fresh [`RunContext`].
    pub async fn run(&self) -> Result<RunOutcome, MonitorError> {
        self.run_with(RunContext::new()).await
    }

    /// Run once under the given context. Every event is nested in a
    /// `run` span carrying the run id.
    pub async fn run_with(&self, context: RunContext) -> Result<RunOutcome, MonitorError> {
        let span = info_span!("run", run_id = %context.run_id);
        self.execute(context).instrument(span).await
    }

    async fn execute(&self, context: RunContext) -> Result<RunOutcome, MonitorError> {
        let started = Instant::now();
        let zones = &self.config.dns.zones;
        info!(zones = zones.len(), dry_run = self.config.dry_run, "starting DNSBL run");
        if self.config.dry_run {
            info!("dry run: no store writes or ticket actions will happen");
        }

        let states = self.store.fetch_all().await?;
        info!(ips = states.len(), "loaded IP addresses");

        let tracker = Arc::new(HealthTracker::new(zones.iter().map(String::as_str))?);
        let prober = ZoneProber::new(Arc::clone(&self.lookup))
            .timeout(self.config.dns.timeout())
            .with_tracker(Arc::clone(&tracker));

        let mut stats = RunStats::default();
        for state in &states {
            self.check_one(&prober, &tracker, state, &mut stats).await?;
        }

        let connectivity = if self.config.dns.network_check {
            self.check_connectivity().await
        } else {
            NetworkConnectivityResult::disabled()
        };
        let summary = tracker.summarize(Some(connectivity));

        if summary.broken_zones > 0 {
            warn!(
                broken = summary.broken_zones,
                total = summary.total_zones,
                zones = ?summary.broken_zone_names(),
                "broken DNSBL zones"
            );
        }
        if summary.network_issue_detected {
            error!(
                broken_fraction = summary.broken_fraction(),
                "DNS infrastructure failure detected"
            );
            self.open_dns_failure_issue(&summary, &mut stats).await;
        }

        let report_files =
            write_reports(&summary, self.config.report.output_dir.as_deref()).await?;

        stats.duration_ms = elapsed_ms(started);
        info!(
            total = stats.total,
            listed = stats.listed,
            cleaned = stats.cleaned,
            unchanged = stats.unchanged,
            tickets_created = stats.tickets_created,
            tickets_updated = stats.tickets_updated,
            ticket_failures = stats.ticket_failures,
            store_failures = stats.store_failures,
            broken_zones = summary.broken_zones,
            duration_ms = stats.duration_ms,
            "run completed"
        );

        Ok(RunOutcome {
            context,
            stats,
            summary,
            report_files,
        })
    }

    async fn check_one(
        &self,
        prober: &ZoneProber,
        tracker: &HealthTracker,
        state: &IpState,
        stats: &mut RunStats,
    ) -> Result<(), MonitorError> {
        let started = Instant::now();
        tracker.record_check_start();
        stats.total += 1;

        let results = check_ip(
            prober,
            state.address,
            &self.config.dns.zones,
            self.config.dns.concurrency,
        )
        .await?;
        let unknown_zones: Vec<&str> = results
            .iter()
            .filter(|r| r.is_unknown())
            .map(|r| r.zone.as_str())
            .collect();

        let Some(transition) = determine_transition(state, &results) else {
            stats.unchanged += 1;
            info!(
                ip = %state.address,
                listed_zones = %state.listed_zones,
                unknown_zones = ?unknown_zones,
                decision = %state.listing_state(),
                db_changes = false,
                ticket_action = TicketAction::NoAction.as_str(),
                duration_ms = elapsed_ms(started),
                "ip check completed"
            );
            return Ok(());
        };

        match transition.kind() {
            TransitionKind::FirstListing | TransitionKind::ZoneChange => stats.listed += 1,
            TransitionKind::Recovery => stats.cleaned += 1,
        }

        let (db_changes, action) = if self.config.dry_run {
            info!(
                ip = %state.address,
                from = %transition.previous_state,
                to = %transition.new_state,
                zones = ?transition.listed_zones,
                "dry run: would apply transition"
            );
            (false, TicketAction::DryRun)
        } else {
            match self.store.apply(state, &transition, &self.config.priority).await {
                Ok(written) => (written, self.ticket_for(&transition, stats).await),
                Err(e) => {
                    error!(ip = %state.address, error = %e, "failed to persist transition");
                    stats.store_failures += 1;
                    (false, TicketAction::NoAction)
                }
            }
        };

        info!(
            ip = %state.address,
            listed_zones = ?transition.listed_zones,
            unknown_zones = ?unknown_zones,
            decision = %transition.new_state,
            transition = %transition.kind(),
            db_changes,
            ticket_action = action.as_str(),
            duration_ms = elapsed_ms(started),
            "ip check completed"
        );
        Ok(())
    }

    async fn ticket_for(&self, transition: &StateTransition, stats: &mut RunStats) -> TicketAction {
        match self.apply_ticket(transition).await {
            Ok(action) => {
                match action {
                    TicketAction::Created(_) => stats.tickets_created += 1,
                    TicketAction::Updated(_) => stats.tickets_updated += 1,
                    _ => {}
                }
                action
            }
            Err(e) => {
                error!(ip = %transition.ip, error = %e, "ticket action failed");
                stats.ticket_failures += 1;
                TicketAction::Failed
            }
        }
    }

    async fn apply_ticket(&self, transition: &StateTransition) -> dnsbl_tickets::Result<TicketAction> {
        let ip = transition.ip;
        let existing = self.tickets.find_open_issue(ip).await?;

        match (transition.kind(), existing) {
            (TransitionKind::FirstListing, None) => {
                let key = self
                    .tickets
                    .create_issue(ip, &transition.listed_zones, &listing_description(transition))
                    .await?;
                Ok(TicketAction::Created(key))
            }
            (TransitionKind::Recovery, Some(issue)) => {
                self.tickets
                    .add_comment(&issue.key, &format!("IP {ip} is now clean (no longer listed)"))
                    .await?;
                Ok(TicketAction::Updated(issue.key))
            }
            (TransitionKind::ZoneChange, Some(issue)) => {
                self.tickets
                    .add_comment(&issue.key, &zone_change_comment(transition))
                    .await?;
                Ok(TicketAction::Updated(issue.key))
            }
            _ => Ok(TicketAction::NoAction),
        }
    }

    async fn check_connectivity(&self) -> NetworkConnectivityResult {
        let timeout = self.config.dns.timeout();
        match &self.connectivity {
            Some((cloudflare, google)) => {
                check_connectivity_with(cloudflare.as_ref(), google.as_ref(), timeout).await
            }
            None => check_connectivity(timeout).await,
        }
    }

    async fn open_dns_failure_issue(&self, summary: &HealthSummary, stats: &mut RunStats) {
        if self.config.dry_run {
            info!("dry run: would open DNS failure issue");
            return;
        }
        match self
            .tickets
            .create_dns_failure_issue(summary.broken_fraction(), &summary.broken_zone_names())
            .await
        {
            Ok(key) => {
                stats.tickets_created += 1;
                info!(key = %key, "opened DNS failure issue");
            }
            Err(e) => {
                stats.ticket_failures += 1;
                error!(error = %e, "failed to open DNS failure issue");
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn listing_description(transition: &StateTransition) -> String {
    let lines: Vec<String> = transition
        .listed_zones
        .iter()
        .map(|z| format!("- {z}"))
        .collect();
    format!(
        "IP {} has been listed on {} DNSBL zone(s):\n{}",
        transition.ip,
        transition.listed_zones.len(),
        lines.join("\n")
    )
}

fn zone_change_comment(transition: &StateTransition) -> String {
    let mut comment = String::from("Zone membership changed:\n");
    if !transition.zone_delta.added.is_empty() {
        comment.push_str(&format!("Added: {}\n", transition.zone_delta.added.join(", ")));
    }
    if !transition.zone_delta.removed.is_empty() {
        comment.push_str(&format!("Removed: {}\n", transition.zone_delta.removed.join(", ")));
    }
    comment.push_str(&format!(
        "Currently listed on: {}",
        transition.listed_zones.join(", ")
    ));
    comment
}
