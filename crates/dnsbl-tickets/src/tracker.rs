//! Ticket tracker contract.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::error::Result;

/// Label attached to DNS infrastructure failure issues
pub const MAJOR_MALFUNCTION_LABEL: &str = "MAJOR MALFUNCTION";

/// An open issue found in the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue key, e.g. `OPS-123`
    pub key: String,
    /// Issue summary line
    pub summary: String,
    /// Workflow status name
    pub status: String,
    /// Creation time, when the tracker reported one
    pub created: Option<DateTime<FixedOffset>>,
}

/// Operations the monitor needs from a ticket system.
#[async_trait]
pub trait TicketTracker: Send + Sync {
    /// Find the open issue tracking `ip`, if any. When several are open the
    /// most recently created one is returned.
    async fn find_open_issue(&self, ip: Ipv4Addr) -> Result<Option<Issue>>;

    /// Open an issue for a newly listed IP and return its key
    async fn create_issue(&self, ip: Ipv4Addr, zones: &[String], description: &str)
        -> Result<String>;

    /// Comment on an existing issue
    async fn add_comment(&self, key: &str, body: &str) -> Result<()>;

    /// Open a DNS infrastructure failure issue and return its key.
    /// `broken_fraction` is in `[0, 1]`.
    async fn create_dns_failure_issue(
        &self,
        broken_fraction: f64,
        failed_zones: &[String],
    ) -> Result<String>;
}

/// Summary line for a listing issue: `IP <ip> blacklisted by <zones>`
#[must_use]
pub fn listing_summary(ip: Ipv4Addr, zones: &[String]) -> String {
    let mut sorted: Vec<&str> = zones.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("IP {ip} blacklisted by {}", sorted.join(","))
}

/// Summary and description for a DNS failure issue
#[must_use]
pub fn dns_failure_text(broken_fraction: f64, failed_zones: &[String]) -> (String, String) {
    let pct = broken_fraction * 100.0;
    let summary = format!("DNS Infrastructure Failure Detected - {pct:.1}% zones unreachable");
    let list: Vec<String> = failed_zones.iter().map(|z| format!("- {z}")).collect();
    let description = format!(
        "{MAJOR_MALFUNCTION_LABEL}: {pct:.1}% of DNSBL zones returned UNKNOWN.\n\nFailed zones:\n{}",
        list.join("\n")
    );
    (summary, description)
}

/// Tracker that only logs what it would do. Used for dry runs and when no
/// ticket system is configured.
#[derive(Debug, Default)]
pub struct NoopTracker {
    next: AtomicU64,
}

impl NoopTracker {
    /// Create a no-op tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&self) -> String {
        format!("NOOP-{}", self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl TicketTracker for NoopTracker {
    async fn find_open_issue(&self, _ip: Ipv4Addr) -> Result<Option<Issue>> {
        Ok(None)
    }

    async fn create_issue(
        &self,
        ip: Ipv4Addr,
        zones: &[String],
        _description: &str,
    ) -> Result<String> {
        let key = self.key();
        info!(key = %key, summary = %listing_summary(ip, zones), "would create issue");
        Ok(key)
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        info!(key, body, "would add comment");
        Ok(())
    }

    async fn create_dns_failure_issue(
        &self,
        broken_fraction: f64,
        failed_zones: &[String],
    ) -> Result<String> {
        let key = self.key();
        let (summary, _) = dns_failure_text(broken_fraction, failed_zones);
        info!(key = %key, summary = %summary, "would create DNS failure issue");
        Ok(key)
    }
}
