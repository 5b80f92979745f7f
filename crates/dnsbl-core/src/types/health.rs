use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::probe::FailureKind;
use crate::error::{CoreError, Result};

/// Health classification of a zone for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    /// At least one probe got a definitive answer (or none were made)
    Healthy,
    /// Every probe failed
    Broken,
}

impl std::fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Broken => write!(f, "broken"),
        }
    }
}

/// Running counters for one zone.
///
/// Counters only move through [`ZoneHealthRecord::record`], which keeps
/// `checks_performed == successful_checks + failed_checks` and
/// `sum(failure_types) == failed_checks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneHealthRecord {
    zone: String,
    checks_performed: u64,
    successful_checks: u64,
    failed_checks: u64,
    failure_types: BTreeMap<FailureKind, u64>,
}

impl ZoneHealthRecord {
    /// Fresh record with all counters at zero
    #[must_use]
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            checks_performed: 0,
            successful_checks: 0,
            failed_checks: 0,
            failure_types: BTreeMap::new(),
        }
    }

    /// Count one check. Failed checks must carry a failure kind; on error
    /// no counter is touched.
    pub fn record(&mut self, success: bool, failure: Option<FailureKind>) -> Result<()> {
        if success {
            self.checks_performed += 1;
            self.successful_checks += 1;
            return Ok(());
        }

        let kind = failure.ok_or_else(|| CoreError::MissingFailureKind {
            zone: self.zone.clone(),
        })?;
        self.checks_performed += 1;
        self.failed_checks += 1;
        *self.failure_types.entry(kind).or_insert(0) += 1;
        Ok(())
    }

    /// Zone name
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Total checks
    #[must_use]
    pub const fn checks_performed(&self) -> u64 {
        self.checks_performed
    }

    /// Checks with a definitive answer
    #[must_use]
    pub const fn successful_checks(&self) -> u64 {
        self.successful_checks
    }

    /// Checks that came back `UNKNOWN`
    #[must_use]
    pub const fn failed_checks(&self) -> u64 {
        self.failed_checks
    }

    /// Failure counts by kind, keys in sorted order
    #[must_use]
    pub const fn failure_types(&self) -> &BTreeMap<FailureKind, u64> {
        &self.failure_types
    }

    /// `failed / performed`, or 0.0 before any check
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_rate(&self) -> f64 {
        if self.checks_performed == 0 {
            return 0.0;
        }
        self.failed_checks as f64 / self.checks_performed as f64
    }

    /// Broken iff every check failed
    #[must_use]
    pub fn status(&self) -> ZoneStatus {
        if self.checks_performed > 0 && self.failed_checks == self.checks_performed {
            ZoneStatus::Broken
        } else {
            ZoneStatus::Healthy
        }
    }

    /// Returns true if every check failed
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.status() == ZoneStatus::Broken
    }
}

/// Result of the supplemental public-resolver probes.
///
/// Reachability is `None` for both resolvers exactly when the check was
/// disabled; the constructors are the only way to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConnectivityResult {
    check_enabled: bool,
    cloudflare_reachable: Option<bool>,
    google_reachable: Option<bool>,
}

impl NetworkConnectivityResult {
    /// The check was not run
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            check_enabled: false,
            cloudflare_reachable: None,
            google_reachable: None,
        }
    }

    /// The check ran with the given outcomes
    #[must_use]
    pub const fn enabled(cloudflare_reachable: bool, google_reachable: bool) -> Self {
        Self {
            check_enabled: true,
            cloudflare_reachable: Some(cloudflare_reachable),
            google_reachable: Some(google_reachable),
        }
    }

    /// Whether the check ran
    #[must_use]
    pub const fn check_enabled(&self) -> bool {
        self.check_enabled
    }

    /// Cloudflare (1.1.1.1) reachability
    #[must_use]
    pub const fn cloudflare_reachable(&self) -> Option<bool> {
        self.cloudflare_reachable
    }

    /// Google (8.8.8.8) reachability
    #[must_use]
    pub const fn google_reachable(&self) -> Option<bool> {
        self.google_reachable
    }

    /// True only when the check ran and neither resolver answered
    #[must_use]
    pub const fn all_unreachable(&self) -> bool {
        self.check_enabled
            && !matches!(self.cloudflare_reachable, Some(true))
            && !matches!(self.google_reachable, Some(true))
    }
}

/// End-of-run health snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    /// When the summary was built
    pub timestamp: DateTime<Utc>,

    /// Number of configured zones
    pub total_zones: usize,

    /// Number of zones whose every probe failed
    pub broken_zones: usize,

    /// Failures look environmental rather than zone-specific
    pub network_issue_detected: bool,

    /// Number of IPs examined
    pub total_ip_checks: u64,

    /// Time from the first IP check to the summary
    pub execution_duration_ms: u64,

    /// Per-zone records, sorted by zone name
    pub zone_health: Vec<ZoneHealthRecord>,

    /// Supplemental check result, if it was run
    pub network_connectivity: Option<NetworkConnectivityResult>,
}

impl HealthSummary {
    /// Fraction of zones that are broken (0.0 with no zones)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn broken_fraction(&self) -> f64 {
        if self.total_zones == 0 {
            return 0.0;
        }
        self.broken_zones as f64 / self.total_zones as f64
    }

    /// Names of broken zones, sorted
    #[must_use]
    pub fn broken_zone_names(&self) -> Vec<String> {
        self.zone_health
            .iter()
            .filter(|r| r.is_broken())
            .map(|r| r.zone().to_string())
            .collect()
    }
}

/// Suggested zone list with broken endpoints removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunedConfiguration {
    /// Zones with at least one definitive answer, sorted
    pub healthy_zones: Vec<String>,

    /// Zones whose every probe failed, sorted
    pub removed_zones: Vec<String>,

    /// When the list was generated
    pub generated_at: DateTime<Utc>,
}

impl PrunedConfiguration {
    /// Split zone records into healthy and removed lists
    #[must_use]
    pub fn from_records(records: &[ZoneHealthRecord], generated_at: DateTime<Utc>) -> Self {
        let (broken, healthy): (Vec<_>, Vec<_>) =
            records.iter().partition(|record| record.is_broken());

        let mut healthy_zones: Vec<String> =
            healthy.iter().map(|r| r.zone().to_string()).collect();
        let mut removed_zones: Vec<String> =
            broken.iter().map(|r| r.zone().to_string()).collect();
        healthy_zones.sort();
        healthy_zones.dedup();
        removed_zones.sort();
        removed_zones.dedup();

        Self {
            healthy_zones,
            removed_zones,
            generated_at,
        }
    }
}
