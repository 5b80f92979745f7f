use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Tri-state classification of a single DNSBL query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    /// In-range (127.0.0.0/8) A record returned
    Listed,
    /// Authoritative NXDOMAIN for the IP-specific name
    NotListed,
    /// Anything that does not allow a definitive answer
    Unknown,
}

impl ProbeStatus {
    /// Returns true for the two definitive outcomes
    #[must_use]
    pub const fn is_definitive(self) -> bool {
        matches!(self, Self::Listed | Self::NotListed)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listed => write!(f, "LISTED"),
            Self::NotListed => write!(f, "NOT_LISTED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Why a probe could not produce a definitive answer.
///
/// Ordering follows the serialized names so that maps keyed by failure
/// kind render with sorted keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A record returned outside 127.0.0.0/8
    InvalidResponseRange,
    /// Empty / no-data answer
    InvalidResponseType,
    /// The zone apex itself does not resolve
    NxdomainZone,
    /// Query exceeded its deadline
    Timeout,
    /// Any other resolver failure
    UnknownError,
}

impl FailureKind {
    /// Wire/tag name of this failure kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidResponseRange => "invalid_response_range",
            Self::InvalidResponseType => "invalid_response_type",
            Self::NxdomainZone => "nxdomain_zone",
            Self::Timeout => "timeout",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one IP against one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Address that was checked
    pub ip: Ipv4Addr,

    /// Zone that was queried
    pub zone: String,

    /// Classification
    pub status: ProbeStatus,

    /// Returned address, or failure tag / error text
    pub detail: String,

    /// Failure category, present only for `UNKNOWN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,

    /// When the probe completed
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Positive listing
    #[must_use]
    pub fn listed(ip: Ipv4Addr, zone: impl Into<String>, response: Ipv4Addr) -> Self {
        Self {
            ip,
            zone: zone.into(),
            status: ProbeStatus::Listed,
            detail: response.to_string(),
            failure: None,
            timestamp: Utc::now(),
        }
    }

    /// Definitive negative
    #[must_use]
    pub fn not_listed(ip: Ipv4Addr, zone: impl Into<String>) -> Self {
        Self {
            ip,
            zone: zone.into(),
            status: ProbeStatus::NotListed,
            detail: String::new(),
            failure: None,
            timestamp: Utc::now(),
        }
    }

    /// Inconclusive result with its failure category
    #[must_use]
    pub fn unknown(
        ip: Ipv4Addr,
        zone: impl Into<String>,
        failure: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            ip,
            zone: zone.into(),
            status: ProbeStatus::Unknown,
            detail: detail.into(),
            failure: Some(failure),
            timestamp: Utc::now(),
        }
    }

    /// Returns true if the zone lists this IP
    #[must_use]
    pub fn is_listed(&self) -> bool {
        self.status == ProbeStatus::Listed
    }

    /// Returns true if the probe was inconclusive
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.status == ProbeStatus::Unknown
    }
}
