//! Core types and decision logic for DNSBL monitoring.
//!
//! This crate provides the pure, network-free half of the monitor:
//!
//! - **Types**: probe results, IP state, transitions and health records
//! - **Query names**: reversed-octet DNSBL name encoding
//! - **Transitions**: the idempotent listed/clean decision for one IP
//! - **Health**: run-wide per-zone counters and outage detection
//! - **Errors**: caller contract violations via [`CoreError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use dnsbl_core::{determine_transition, IpState, ProbeResult};
//!
//! fn decide(state: &IpState, results: &[ProbeResult]) {
//!     match determine_transition(state, results) {
//!         Some(t) => println!("{} -> {} ({})", t.previous_state, t.new_state, t.kind()),
//!         None => println!("no change"),
//!     }
//! }
//! ```

pub mod context;
mod error;
pub mod health;
pub mod query_name;
pub mod transition;
pub mod types;

pub use context::RunContext;
pub use error::{CoreError, Result};
pub use health::HealthTracker;
pub use transition::{aggregate_results, determine_transition, diff_zones};
pub use types::*;
