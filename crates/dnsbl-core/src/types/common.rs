use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted, deduplicated set of DNSBL zone names.
///
/// Persisted as a comma-joined string (`a.example,b.example`), which is
/// why ordering is canonical: two sets with the same members always
/// produce the same persisted value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneSet(BTreeSet<String>);

impl ZoneSet {
    /// Create an empty zone set
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse the persisted comma-joined form. Blank entries are dropped.
    #[must_use]
    pub fn from_persisted(value: &str) -> Self {
        value
            .split(',')
            .map(str::trim)
            .filter(|zone| !zone.is_empty())
            .collect()
    }

    /// Render the persisted comma-joined form (empty string when clean)
    #[must_use]
    pub fn to_persisted(&self) -> String {
        self.to_vec().join(",")
    }

    /// Returns true if no zones are present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of zones
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the zone is present
    #[must_use]
    pub fn contains(&self, zone: &str) -> bool {
        self.0.contains(zone)
    }

    /// Add a zone, returning true if it was not already present
    pub fn insert(&mut self, zone: impl Into<String>) -> bool {
        self.0.insert(zone.into())
    }

    /// Iterate over zones in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Sorted zones as an owned vector
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Zones in `self` that are not in `other`, sorted
    #[must_use]
    pub fn difference(&self, other: &Self) -> Vec<String> {
        self.0.difference(&other.0).cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ZoneSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for ZoneSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_persisted())
    }
}

/// Listing state of an IP address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingState {
    /// Not listed on any configured zone
    Clean,
    /// Listed on at least one configured zone
    Listed,
}

impl ListingState {
    /// Listing state implied by a set of listed zones
    #[must_use]
    pub fn from_zones(zones: &ZoneSet) -> Self {
        if zones.is_empty() {
            Self::Clean
        } else {
            Self::Listed
        }
    }
}

impl std::fmt::Display for ListingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "CLEAN"),
            Self::Listed => write!(f, "LISTED"),
        }
    }
}
