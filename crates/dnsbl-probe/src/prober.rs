//! Single (IP, zone) DNSBL probe and response classification.

use dnsbl_core::query_name::{is_listing_response, query_name_for, validate_zone};
use dnsbl_core::{FailureKind, HealthTracker, ProbeResult};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{ProbeError, Result};
use crate::lookup::{DnsLookup, LookupOutcome};

/// Default per-query timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes one zone for one IP and classifies the answer.
///
/// Every DNS-layer problem becomes an `UNKNOWN` result carrying a
/// [`FailureKind`]. The only error is the attached tracker rejecting an
/// outcome, which means the prober was wired to the wrong zone list.
#[derive(Clone)]
pub struct ZoneProber {
    lookup: Arc<dyn DnsLookup>,
    timeout: Duration,
    tracker: Option<Arc<HealthTracker>>,
}

impl std::fmt::Debug for ZoneProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneProber")
            .field("timeout", &self.timeout)
            .field("tracked", &self.tracker.is_some())
            .finish_non_exhaustive()
    }
}

impl ZoneProber {
    /// Create a prober over a lookup implementation
    #[must_use]
    pub fn new(lookup: Arc<dyn DnsLookup>) -> Self {
        Self {
            lookup,
            timeout: DEFAULT_TIMEOUT,
            tracker: None,
        }
    }

    /// Set the per-query deadline
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report every outcome to a health tracker
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<HealthTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Probe `ip` against `zone` and report the outcome to the tracker.
    pub async fn probe(&self, ip: Ipv4Addr, zone: &str) -> Result<ProbeResult> {
        let result = self.classify(ip, zone).await;
        self.record(&result)?;
        Ok(result)
    }

    /// Report an outcome to the attached tracker, if any.
    pub(crate) fn record(&self, result: &ProbeResult) -> Result<()> {
        let Some(tracker) = &self.tracker else {
            return Ok(());
        };
        tracker
            .record_result(&result.zone, result.status.is_definitive(), result.failure)
            .map_err(|e| {
                error!(zone = %result.zone, error = %e, "health tracker rejected probe outcome");
                ProbeError::from(e)
            })
    }

    async fn classify(&self, ip: Ipv4Addr, zone: &str) -> ProbeResult {
        let zone_name = match validate_zone(zone) {
            Ok(z) => z,
            Err(e) => {
                return ProbeResult::unknown(ip, zone, FailureKind::UnknownError, e.to_string());
            }
        };
        let query = query_name_for(&ip, zone_name);

        let outcome = match tokio::time::timeout(self.timeout, self.lookup.lookup_a(&query)).await
        {
            Ok(outcome) => outcome,
            Err(_) => LookupOutcome::Timeout,
        };

        let result = interpret(ip, zone, outcome);
        debug!(
            ip = %ip,
            zone,
            query = %query,
            status = %result.status,
            detail = %result.detail,
            "probe complete"
        );
        result
    }
}

/// Map a raw lookup outcome onto DNSBL semantics.
#[must_use]
pub fn interpret(ip: Ipv4Addr, zone: &str, outcome: LookupOutcome) -> ProbeResult {
    match outcome {
        LookupOutcome::Addresses(addrs) => match addrs.first() {
            Some(addr) if is_listing_response(addr) => ProbeResult::listed(ip, zone, *addr),
            Some(addr) => ProbeResult::unknown(
                ip,
                zone,
                FailureKind::InvalidResponseRange,
                addr.to_string(),
            ),
            None => unknown_tagged(ip, zone, FailureKind::InvalidResponseType),
        },
        LookupOutcome::NxDomain { authority } => {
            if zone_apex_missing(authority.as_deref(), zone) {
                unknown_tagged(ip, zone, FailureKind::NxdomainZone)
            } else {
                ProbeResult::not_listed(ip, zone)
            }
        }
        LookupOutcome::NoData => unknown_tagged(ip, zone, FailureKind::InvalidResponseType),
        LookupOutcome::Timeout => unknown_tagged(ip, zone, FailureKind::Timeout),
        LookupOutcome::Failed(reason) => {
            ProbeResult::unknown(ip, zone, FailureKind::UnknownError, reason)
        }
    }
}

fn unknown_tagged(ip: Ipv4Addr, zone: &str, kind: FailureKind) -> ProbeResult {
    ProbeResult::unknown(ip, zone, kind, kind.as_str())
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// True when an NXDOMAIN was answered by a strict ancestor of the zone,
/// i.e. the zone apex itself does not exist. An answer from the zone (or
/// below it), or one without an SOA, is an ordinary "not listed".
fn zone_apex_missing(authority: Option<&str>, zone: &str) -> bool {
    let Some(authority) = authority else {
        return false;
    };
    let authority = normalize(authority);
    let zone = normalize(zone);

    if authority == zone || authority.ends_with(&format!(".{zone}")) {
        return false;
    }
    authority.is_empty() || zone.ends_with(&format!(".{authority}"))
}
