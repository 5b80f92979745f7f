//! Run-wide DNSBL health aggregation.
//!
//! Probes push their outcomes into a shared [`HealthTracker`] as they
//! complete; at the end of the run the tracker is folded into a
//! [`HealthSummary`]. The per-zone map is the only state touched by
//! concurrent probes, so it sits behind one mutex that is held only for
//! the counter update.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::types::{FailureKind, HealthSummary, NetworkConnectivityResult, ZoneHealthRecord};

/// Share of broken zones at which a network-wide outage becomes plausible.
pub const NETWORK_ISSUE_THRESHOLD: f64 = 0.5;

#[derive(Debug)]
struct TrackerState {
    records: BTreeMap<String, ZoneHealthRecord>,
    started: Option<Instant>,
    total_ip_checks: u64,
}

/// Accumulates per-zone success/failure counts across a run.
#[derive(Debug)]
pub struct HealthTracker {
    state: Mutex<TrackerState>,
}

impl HealthTracker {
    /// Create a tracker for the configured zones. Duplicates collapse into
    /// one record.
    pub fn new<I, S>(zones: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records: BTreeMap<String, ZoneHealthRecord> = zones
            .into_iter()
            .map(Into::into)
            .map(|zone: String| (zone.clone(), ZoneHealthRecord::new(zone)))
            .collect();

        if records.is_empty() {
            return Err(CoreError::EmptyZoneList);
        }

        Ok(Self {
            state: Mutex::new(TrackerState {
                records,
                started: None,
                total_ip_checks: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Counters are updated atomically under the lock, so a panic in
        // another holder cannot leave a record half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the start of one IP's checks. The first call starts the run
    /// clock.
    pub fn record_check_start(&self) {
        let mut state = self.lock();
        if state.started.is_none() {
            state.started = Some(Instant::now());
        }
        state.total_ip_checks += 1;
    }

    /// Count one probe outcome for a zone.
    pub fn record_result(
        &self,
        zone: &str,
        success: bool,
        failure: Option<FailureKind>,
    ) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(zone)
            .ok_or_else(|| CoreError::UnknownZone(zone.to_string()))?;
        record.record(success, failure)
    }

    /// Zones this tracker was built with, sorted
    #[must_use]
    pub fn zones(&self) -> Vec<String> {
        self.lock().records.keys().cloned().collect()
    }

    /// Current counters for one zone
    #[must_use]
    pub fn snapshot(&self, zone: &str) -> Option<ZoneHealthRecord> {
        self.lock().records.get(zone).cloned()
    }

    /// Number of IPs examined so far
    #[must_use]
    pub fn total_ip_checks(&self) -> u64 {
        self.lock().total_ip_checks
    }

    /// Build the end-of-run summary.
    ///
    /// A network issue is flagged only when at least half the zones are
    /// broken *and* the supplemental check ran *and* neither public
    /// resolver answered. One reachable resolver rules the outage out.
    #[must_use]
    pub fn summarize(&self, connectivity: Option<NetworkConnectivityResult>) -> HealthSummary {
        let state = self.lock();

        let zone_health: Vec<ZoneHealthRecord> = state.records.values().cloned().collect();
        let total_zones = zone_health.len();
        let broken_zones = zone_health.iter().filter(|r| r.is_broken()).count();

        #[allow(clippy::cast_precision_loss)]
        let broken_fraction = broken_zones as f64 / total_zones as f64;
        let network_issue_detected = broken_fraction >= NETWORK_ISSUE_THRESHOLD
            && connectivity.is_some_and(|c| c.all_unreachable());

        let execution_duration_ms = state
            .started
            .map_or(0, |start| u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));

        debug!(
            total_zones,
            broken_zones,
            network_issue_detected,
            total_ip_checks = state.total_ip_checks,
            "built health summary"
        );

        HealthSummary {
            timestamp: Utc::now(),
            total_zones,
            broken_zones,
            network_issue_detected,
            total_ip_checks: state.total_ip_checks,
            execution_duration_ms,
            zone_health,
            network_connectivity: connectivity,
        }
    }
}
