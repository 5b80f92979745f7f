use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::common::ListingState;

/// Zones added to and removed from an IP's listing, both sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDelta {
    /// Newly listing zones
    pub added: Vec<String>,
    /// Zones that no longer list the IP
    pub removed: Vec<String>,
}

impl ZoneDelta {
    /// Returns true if nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Which persistence action a transition calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// CLEAN -> LISTED: back up priority (once) and throttle
    FirstListing,
    /// LISTED -> CLEAN: restore priority and clear the backup
    Recovery,
    /// LISTED -> LISTED with a different zone set: zone list only
    ZoneChange,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstListing => write!(f, "first_listing"),
            Self::Recovery => write!(f, "recovery"),
            Self::ZoneChange => write!(f, "zone_change"),
        }
    }
}

/// Decision produced for one IP in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// IP the decision applies to
    pub ip: Ipv4Addr,

    /// State recorded before this run
    pub previous_state: ListingState,

    /// State observed in this run
    pub new_state: ListingState,

    /// Zones listing the IP in this run (sorted, deduplicated)
    pub listed_zones: Vec<String>,

    /// Zones that gave no definitive answer in this run (sorted)
    #[serde(default)]
    pub unknown_zones: Vec<String>,

    /// Change in zone membership
    pub zone_delta: ZoneDelta,

    /// Whether the storage layer must apply this transition
    pub requires_update: bool,
}

impl StateTransition {
    /// Persistence action implied by the two states.
    ///
    /// CLEAN -> CLEAN never produces a transition, so it is not a kind.
    #[must_use]
    pub const fn kind(&self) -> TransitionKind {
        match (self.previous_state, self.new_state) {
            (ListingState::Clean, _) => TransitionKind::FirstListing,
            (ListingState::Listed, ListingState::Clean) => TransitionKind::Recovery,
            (ListingState::Listed, ListingState::Listed) => TransitionKind::ZoneChange,
        }
    }
}
