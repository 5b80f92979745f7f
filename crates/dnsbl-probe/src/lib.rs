//! DNS probing for DNSBL monitoring.
//!
//! This crate performs the network half of a check:
//!
//! - **Lookup**: the [`DnsLookup`] seam, backed by hickory
//! - **Prober**: one (IP, zone) query classified into a [`dnsbl_core::ProbeResult`]
//! - **Fan-out**: all zones for one IP, bounded by a semaphore
//! - **Connectivity**: public resolver reachability for outage confirmation

pub mod connectivity;
mod error;
pub mod fanout;
pub mod lookup;
pub mod prober;

pub use connectivity::{check_connectivity, check_connectivity_with};
pub use error::{ProbeError, Result};
pub use fanout::check_ip;
pub use lookup::{DnsLookup, HickoryLookup, LookupOutcome, StaticLookup};
pub use prober::ZoneProber;
