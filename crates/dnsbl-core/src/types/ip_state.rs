use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::common::{ListingState, ZoneSet};

/// Persisted state of one sending IP, as supplied by the storage layer.
///
/// `backup_priority` holds the priority the IP had before it was first
/// listed. It is set once on the clean -> listed edge and cleared on the
/// listed -> clean edge; it is never overwritten while set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpState {
    /// Storage identifier
    pub id: u64,

    /// IPv4 address
    pub address: Ipv4Addr,

    /// Current throttling priority (0-100, lower = more throttled)
    pub priority: u8,

    /// Saved priority while listed
    #[serde(default)]
    pub backup_priority: Option<u8>,

    /// Zones the IP is currently recorded as listed on
    #[serde(default)]
    pub listed_zones: ZoneSet,

    /// Description of the last applied transition
    #[serde(default)]
    pub last_event: Option<String>,
}

impl IpState {
    /// A clean IP with no history
    #[must_use]
    pub fn clean(id: u64, address: Ipv4Addr, priority: u8) -> Self {
        Self {
            id,
            address,
            priority,
            backup_priority: None,
            listed_zones: ZoneSet::new(),
            last_event: None,
        }
    }

    /// Returns true if the IP is recorded as listed anywhere
    #[must_use]
    pub fn is_listed(&self) -> bool {
        !self.listed_zones.is_empty()
    }

    /// Listing state derived from the recorded zones
    #[must_use]
    pub fn listing_state(&self) -> ListingState {
        ListingState::from_zones(&self.listed_zones)
    }
}
