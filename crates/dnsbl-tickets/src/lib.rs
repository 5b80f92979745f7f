//! Ticketing for DNSBL listing changes.
//!
//! The monitor talks to a [`TicketTracker`]. [`JiraClient`] implements it
//! against the Jira REST API v2 with every call wrapped in a
//! [`RetryPolicy`]; [`NoopTracker`] stands in for dry runs.

mod client;
mod error;
mod retry;
mod tracker;

pub use client::{JiraClient, JiraClientBuilder};
pub use error::{Result, TicketError};
pub use retry::RetryPolicy;
pub use tracker::{Issue, NoopTracker, TicketTracker, MAJOR_MALFUNCTION_LABEL};
