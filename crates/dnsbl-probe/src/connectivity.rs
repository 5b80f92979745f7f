//! Public-resolver reachability check used to confirm network outages.

use dnsbl_core::NetworkConnectivityResult;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};

use crate::lookup::{DnsLookup, HickoryLookup, LookupOutcome};

/// Cloudflare public resolver
pub const CLOUDFLARE_RESOLVER: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53);

/// Google public resolver
pub const GOOGLE_RESOLVER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53);

/// Name looked up against both resolvers
pub const REFERENCE_NAME: &str = "google.com";

/// Ask 1.1.1.1 and 8.8.8.8 for `google.com` concurrently.
pub async fn check_connectivity(timeout: Duration) -> NetworkConnectivityResult {
    let cloudflare = HickoryLookup::single_nameserver(CLOUDFLARE_RESOLVER, timeout);
    let google = HickoryLookup::single_nameserver(GOOGLE_RESOLVER, timeout);
    check_connectivity_with(&cloudflare, &google, timeout).await
}

/// Same check over arbitrary lookups.
pub async fn check_connectivity_with(
    cloudflare: &dyn DnsLookup,
    google: &dyn DnsLookup,
    timeout: Duration,
) -> NetworkConnectivityResult {
    let (cloudflare_ok, google_ok) = tokio::join!(
        reachable(cloudflare, "cloudflare", timeout),
        reachable(google, "google", timeout),
    );

    if cloudflare_ok || google_ok {
        info!(
            cloudflare = cloudflare_ok,
            google = google_ok,
            "public DNS reachable"
        );
    } else {
        warn!("both public DNS resolvers unreachable");
    }

    NetworkConnectivityResult::enabled(cloudflare_ok, google_ok)
}

async fn reachable(lookup: &dyn DnsLookup, label: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, lookup.lookup_a(REFERENCE_NAME)).await {
        Ok(LookupOutcome::Addresses(addrs)) => !addrs.is_empty(),
        Ok(other) => {
            warn!(resolver = label, outcome = ?other, "connectivity probe failed");
            false
        }
        Err(_) => {
            warn!(resolver = label, "connectivity probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticLookup;

    fn answering() -> StaticLookup {
        StaticLookup::new().answer(
            REFERENCE_NAME,
            LookupOutcome::Addresses(vec![Ipv4Addr::new(142, 250, 1, 1)]),
        )
    }

    fn silent() -> StaticLookup {
        StaticLookup::new().fallback(LookupOutcome::Timeout)
    }

    const T: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_both_reachable() {
        let result = check_connectivity_with(&answering(), &answering(), T).await;
        assert!(result.check_enabled());
        assert_eq!(result.cloudflare_reachable(), Some(true));
        assert_eq!(result.google_reachable(), Some(true));
        assert!(!result.all_unreachable());
    }

    #[tokio::test]
    async fn test_one_reachable() {
        let result = check_connectivity_with(&silent(), &answering(), T).await;
        assert_eq!(result.cloudflare_reachable(), Some(false));
        assert_eq!(result.google_reachable(), Some(true));
        assert!(!result.all_unreachable());
    }

    #[tokio::test]
    async fn test_neither_reachable() {
        let slow = answering().delay(Duration::from_secs(5));
        let result = check_connectivity_with(&silent(), &slow, Duration::from_millis(20)).await;
        assert!(result.check_enabled());
        assert!(result.all_unreachable());
    }

    #[tokio::test]
    async fn test_nxdomain_counts_as_unreachable() {
        let result = check_connectivity_with(&StaticLookup::new(), &silent(), T).await;
        assert_eq!(result.cloudflare_reachable(), Some(false));
    }
}
