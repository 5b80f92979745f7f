//! DNS A-record lookup seam.
//!
//! Probing code never talks to hickory directly; it asks a [`DnsLookup`]
//! for a [`LookupOutcome`]. [`HickoryLookup`] is the real implementation,
//! [`StaticLookup`] serves canned answers without touching the network.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::{ResolveError, ResolveErrorKind, Resolver, TokioResolver};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ProbeError, Result};

/// Raw outcome of one A-record query, before DNSBL interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// One or more A records
    Addresses(Vec<Ipv4Addr>),
    /// The name exists but has no A records
    NoData,
    /// NXDOMAIN. `authority` is the owner of the SOA carried in the
    /// negative answer, when the server sent one.
    NxDomain {
        /// Zone that answered authoritatively
        authority: Option<String>,
    },
    /// No answer before the deadline
    Timeout,
    /// Any other failure
    Failed(String),
}

/// Something that can resolve A records.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// Resolve A records for a fully qualified name
    async fn lookup_a(&self, name: &str) -> LookupOutcome;
}

/// hickory-backed lookup
#[derive(Clone)]
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    /// Use the system resolver configuration with a per-query timeout and a
    /// single attempt.
    pub fn system(timeout: Duration) -> Result<Self> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| ProbeError::Resolver(format!("failed to read system config: {e}")))?
            .with_options(probe_options(timeout))
            .build();
        Ok(Self { resolver })
    }

    /// Query exactly one nameserver over UDP
    #[must_use]
    pub fn single_nameserver(addr: SocketAddr, timeout: Duration) -> Self {
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            vec![NameServerConfig::new(addr, Protocol::Udp)],
        );
        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(probe_options(timeout))
            .build();
        Self { resolver }
    }
}

fn probe_options(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts
}

/// Force an absolute name so search domains are never appended.
fn fully_qualified(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

fn classify_error(err: &ResolveError) -> LookupOutcome {
    let ResolveErrorKind::Proto(proto) = err.kind() else {
        return LookupOutcome::Failed(err.to_string());
    };

    match proto.kind() {
        ProtoErrorKind::NoRecordsFound {
            soa, response_code, ..
        } => {
            if *response_code == ResponseCode::NXDomain {
                LookupOutcome::NxDomain {
                    authority: soa.as_ref().map(|record| record.name().to_string()),
                }
            } else if *response_code == ResponseCode::NoError {
                LookupOutcome::NoData
            } else {
                LookupOutcome::Failed(format!("response code {response_code}"))
            }
        }
        ProtoErrorKind::Timeout => LookupOutcome::Timeout,
        _ => LookupOutcome::Failed(err.to_string()),
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn lookup_a(&self, name: &str) -> LookupOutcome {
        let fqdn = fully_qualified(name);
        match self.resolver.ipv4_lookup(fqdn.as_str()).await {
            Ok(lookup) => {
                let addrs: Vec<Ipv4Addr> = lookup.iter().map(|a| a.0).collect();
                if addrs.is_empty() {
                    LookupOutcome::NoData
                } else {
                    LookupOutcome::Addresses(addrs)
                }
            }
            Err(e) => {
                let outcome = classify_error(&e);
                debug!(name = %fqdn, error = %e, ?outcome, "A lookup failed");
                outcome
            }
        }
    }
}

/// Canned answers keyed by query name, for dry runs and tests.
///
/// Names are matched without a trailing dot. Unmatched names get the
/// fallback outcome (NXDOMAIN from an unnamed authority by default).
#[derive(Debug, Clone)]
pub struct StaticLookup {
    answers: HashMap<String, LookupOutcome>,
    fallback: LookupOutcome,
    delay: Option<Duration>,
}

impl Default for StaticLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticLookup {
    /// Empty table answering NXDOMAIN for everything
    #[must_use]
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            fallback: LookupOutcome::NxDomain { authority: None },
            delay: None,
        }
    }

    /// Register an answer for one name
    #[must_use]
    pub fn answer(mut self, name: impl Into<String>, outcome: LookupOutcome) -> Self {
        let name = name.into();
        self.answers
            .insert(name.trim_end_matches('.').to_string(), outcome);
        self
    }

    /// Outcome for names without an explicit answer
    #[must_use]
    pub fn fallback(mut self, outcome: LookupOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Sleep before answering, to exercise deadlines and concurrency
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wrap in an `Arc` for sharing with a prober
    #[must_use]
    pub fn shared(self) -> Arc<dyn DnsLookup> {
        Arc::new(self)
    }
}

#[async_trait]
impl DnsLookup for StaticLookup {
    async fn lookup_a(&self, name: &str) -> LookupOutcome {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .get(name.trim_end_matches('.'))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_qualified() {
        assert_eq!(fully_qualified("4.3.2.1.bl.example.org"), "4.3.2.1.bl.example.org.");
        assert_eq!(fully_qualified("google.com."), "google.com.");
    }

    #[tokio::test]
    async fn test_static_lookup_matches_with_or_without_dot() {
        let lookup = StaticLookup::new().answer(
            "4.3.2.1.bl.example.org.",
            LookupOutcome::Addresses(vec![Ipv4Addr::new(127, 0, 0, 2)]),
        );
        assert_eq!(
            lookup.lookup_a("4.3.2.1.bl.example.org").await,
            LookupOutcome::Addresses(vec![Ipv4Addr::new(127, 0, 0, 2)])
        );
        assert_eq!(
            lookup.lookup_a("5.3.2.1.bl.example.org.").await,
            LookupOutcome::NxDomain { authority: None }
        );
    }

    #[tokio::test]
    async fn test_static_lookup_fallback() {
        let lookup = StaticLookup::new().fallback(LookupOutcome::Timeout);
        assert_eq!(lookup.lookup_a("anything.example").await, LookupOutcome::Timeout);
    }
}
