//! State transition decisions.
//!
//! Maps an IP's recorded state plus the current run's probe results to
//! either "nothing to do" (`None`) or a [`StateTransition`]. Only `LISTED`
//! evidence counts: an `UNKNOWN` zone is treated as not listing the IP for
//! this run, exactly like `NOT_LISTED`.
//!
//! ```text
//! prior \ observed |  no listing        | listing
//! -----------------+--------------------+---------------------------------
//! CLEAN            |  None              | FirstListing
//! LISTED           |  Recovery          | None if same zone set,
//!                  |                    | ZoneChange otherwise
//! ```

use crate::types::{
    IpState, ListingState, ProbeResult, ProbeStatus, StateTransition, ZoneDelta, ZoneSet,
};

/// Zones that listed the IP and zones that gave no answer, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedResults {
    /// Zones returning `LISTED`
    pub listed: ZoneSet,
    /// Zones returning `UNKNOWN`
    pub unknown: ZoneSet,
}

/// Split probe results into listed and unknown zone sets.
#[must_use]
pub fn aggregate_results(results: &[ProbeResult]) -> AggregatedResults {
    let mut aggregated = AggregatedResults::default();
    for result in results {
        match result.status {
            ProbeStatus::Listed => {
                aggregated.listed.insert(result.zone.as_str());
            }
            ProbeStatus::Unknown => {
                aggregated.unknown.insert(result.zone.as_str());
            }
            ProbeStatus::NotListed => {}
        }
    }
    aggregated
}

/// Added/removed zones between the recorded and observed sets.
#[must_use]
pub fn diff_zones(current: &ZoneSet, observed: &ZoneSet) -> ZoneDelta {
    ZoneDelta {
        added: observed.difference(current),
        removed: current.difference(observed),
    }
}

/// Decide whether this run changes the IP's recorded state.
///
/// Returns `None` when the listing state and zone set are both unchanged,
/// so re-running against an unchanged world performs no writes.
#[must_use]
pub fn determine_transition(prior: &IpState, results: &[ProbeResult]) -> Option<StateTransition> {
    let aggregated = aggregate_results(results);

    let previous_state = prior.listing_state();
    let new_state = ListingState::from_zones(&aggregated.listed);

    if previous_state == new_state && prior.listed_zones == aggregated.listed {
        return None;
    }

    Some(StateTransition {
        ip: prior.address,
        previous_state,
        new_state,
        zone_delta: diff_zones(&prior.listed_zones, &aggregated.listed),
        listed_zones: aggregated.listed.to_vec(),
        unknown_zones: aggregated.unknown.to_vec(),
        requires_update: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureKind, TransitionKind};
    use std::net::Ipv4Addr;

    const IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 45);

    fn prior(zones: &[&str]) -> IpState {
        let mut state = IpState::clean(1, IP, 100);
        state.listed_zones = zones.iter().copied().collect();
        state
    }

    fn listed(zone: &str) -> ProbeResult {
        ProbeResult::listed(IP, zone, Ipv4Addr::new(127, 0, 0, 2))
    }

    fn clean(zone: &str) -> ProbeResult {
        ProbeResult::not_listed(IP, zone)
    }

    fn unknown(zone: &str) -> ProbeResult {
        ProbeResult::unknown(IP, zone, FailureKind::Timeout, "timeout")
    }

    #[test]
    fn test_clean_to_listed() {
        let transition =
            determine_transition(&prior(&[]), &[listed("zoneA"), clean("zoneB")]).unwrap();

        assert_eq!(transition.previous_state, ListingState::Clean);
        assert_eq!(transition.new_state, ListingState::Listed);
        assert_eq!(transition.listed_zones, vec!["zoneA"]);
        assert_eq!(transition.zone_delta.added, vec!["zoneA"]);
        assert!(transition.zone_delta.removed.is_empty());
        assert!(transition.requires_update);
        assert_eq!(transition.kind(), TransitionKind::FirstListing);
    }

    #[test]
    fn test_listed_to_clean() {
        let transition = determine_transition(&prior(&["zoneA"]), &[clean("zoneA")]).unwrap();

        assert_eq!(transition.previous_state, ListingState::Listed);
        assert_eq!(transition.new_state, ListingState::Clean);
        assert!(transition.listed_zones.is_empty());
        assert_eq!(transition.zone_delta.removed, vec!["zoneA"]);
        assert_eq!(transition.kind(), TransitionKind::Recovery);
    }

    #[test]
    fn test_listed_zone_change() {
        let transition =
            determine_transition(&prior(&["zoneA"]), &[clean("zoneA"), listed("zoneB")]).unwrap();

        assert_eq!(transition.previous_state, ListingState::Listed);
        assert_eq!(transition.new_state, ListingState::Listed);
        assert_eq!(transition.zone_delta.added, vec!["zoneB"]);
        assert_eq!(transition.zone_delta.removed, vec!["zoneA"]);
        assert_eq!(transition.kind(), TransitionKind::ZoneChange);
    }

    #[test]
    fn test_clean_stays_clean() {
        assert!(determine_transition(&prior(&[]), &[clean("zoneA"), clean("zoneB")]).is_none());
    }

    #[test]
    fn test_zone_order_is_irrelevant() {
        let results = [listed("a"), listed("b")];
        assert!(determine_transition(&prior(&["b", "a"]), &results).is_none());

        let reversed = [listed("b"), listed("a")];
        assert!(determine_transition(&prior(&["a", "b"]), &reversed).is_none());
    }

    #[test]
    fn test_unknown_never_counts_as_listed() {
        // Clean IP with all zones failing stays clean.
        assert!(determine_transition(&prior(&[]), &[unknown("zoneA"), unknown("zoneB")]).is_none());

        // A listed IP whose only zone is now unreachable counts as recovered.
        let transition = determine_transition(&prior(&["zoneA"]), &[unknown("zoneA")]).unwrap();
        assert_eq!(transition.new_state, ListingState::Clean);
        assert_eq!(transition.unknown_zones, vec!["zoneA"]);
    }

    #[test]
    fn test_idempotent_once_applied() {
        let results = [listed("zoneB"), listed("zoneA"), unknown("zoneC")];
        let mut state = prior(&[]);

        let first = determine_transition(&state, &results).unwrap();
        assert_eq!(first.listed_zones, vec!["zoneA", "zoneB"]);

        state.listed_zones = first.listed_zones.iter().map(String::as_str).collect();
        assert!(determine_transition(&state, &results).is_none());
        assert!(determine_transition(&state, &results).is_none());
    }

    #[test]
    fn test_duplicate_results_are_deduplicated() {
        let transition =
            determine_transition(&prior(&[]), &[listed("zoneA"), listed("zoneA")]).unwrap();
        assert_eq!(transition.listed_zones, vec!["zoneA"]);
        assert_eq!(transition.zone_delta.added, vec!["zoneA"]);
    }

    #[test]
    fn test_aggregate_results_sorted() {
        let aggregated =
            aggregate_results(&[unknown("z"), listed("m"), unknown("b"), listed("a"), clean("q")]);
        assert_eq!(aggregated.listed.to_vec(), vec!["a", "m"]);
        assert_eq!(aggregated.unknown.to_vec(), vec!["b", "z"]);
    }

    #[test]
    fn test_diff_zones() {
        let current: ZoneSet = ["a", "b"].into_iter().collect();
        let observed: ZoneSet = ["b", "c", "d"].into_iter().collect();
        let delta = diff_zones(&current, &observed);
        assert_eq!(delta.added, vec!["c", "d"]);
        assert_eq!(delta.removed, vec!["a"]);
        assert!(diff_zones(&current, &current).is_empty());
    }
}
