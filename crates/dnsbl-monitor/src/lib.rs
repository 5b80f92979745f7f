//! # dnsbl-monitor
//!
//! Checks a fleet of sending IPs against DNSBL zones and keeps their
//! delivery priority in step with their listing state.
//!
//! ## Features
//!
//! - **Run**: probe every stored IP, throttle new listings, restore
//!   recovered IPs and open or update tickets
//! - **Zone health**: per-zone failure rates, outage detection and a
//!   pruned zone list with broken endpoints removed
//! - **Ad-hoc checks**: probe one IP from the command line
//! - **Output formats**: colored text, JSON, YAML

pub mod cli;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod output;
pub mod report;
pub mod store;

pub use cli::run;
pub use config::{ConfigError, MonitorConfig};
pub use monitor::{Monitor, MonitorError, RunOutcome, RunStats};
pub use store::{IpStore, JsonFileStore, StoreError};
