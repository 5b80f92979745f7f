//! Bounded parallel probing of every zone for one IP.

use dnsbl_core::{FailureKind, ProbeResult};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{ProbeError, Result};
use crate::prober::ZoneProber;

/// Default number of in-flight probes per IP
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Probe `ip` against every zone, at most `concurrency_limit` at a time.
///
/// Returns exactly one result per distinct zone, sorted by zone name. A
/// probe task that dies without producing a result is reported as
/// `UNKNOWN` / `unknown_error`. A limit of 0 is treated as 1.
///
/// Fails if the prober's tracker rejects an outcome. Probes still in
/// flight are aborted.
pub async fn check_ip<S: AsRef<str>>(
    prober: &ZoneProber,
    ip: Ipv4Addr,
    zones: &[S],
    concurrency_limit: usize,
) -> Result<Vec<ProbeResult>> {
    let distinct: BTreeSet<&str> = zones.iter().map(AsRef::as_ref).collect();
    if distinct.is_empty() {
        return Err(ProbeError::EmptyZoneList);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency_limit.max(1)));
    let mut handles = Vec::with_capacity(distinct.len());

    for zone in &distinct {
        let sem = Arc::clone(&semaphore);
        let prober = prober.clone();
        let name = (*zone).to_string();

        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so acquire only fails if that
            // changes; probe unbounded rather than drop the zone.
            let _permit = sem.acquire_owned().await.ok();
            prober.probe(ip, &name).await
        });
        handles.push(((*zone).to_string(), handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut pending = handles.into_iter();
    while let Some((zone, handle)) = pending.next() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(ip = %ip, zone = %zone, error = %e, "probe task failed");
                let result =
                    ProbeResult::unknown(ip, zone, FailureKind::UnknownError, e.to_string());
                prober.record(&result).map(|()| result)
            }
        };
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                for (_, rest) in pending {
                    rest.abort();
                }
                return Err(e);
            }
        }
    }

    results.sort_by(|a, b| a.zone.cmp(&b.zone));

    debug!(
        ip = %ip,
        zones = results.len(),
        listed = results.iter().filter(|r| r.is_listed()).count(),
        unknown = results.iter().filter(|r| r.is_unknown()).count(),
        "fan-out complete"
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{DnsLookup, LookupOutcome, StaticLookup};
    use async_trait::async_trait;
    use dnsbl_core::{CoreError, HealthTracker, ProbeStatus};
    use std::time::{Duration, Instant};

    /// Panics on one name, answers NXDOMAIN for the rest
    struct PanicOn(&'static str);

    #[async_trait]
    impl DnsLookup for PanicOn {
        async fn lookup_a(&self, name: &str) -> LookupOutcome {
            assert!(!name.ends_with(self.0), "lookup blew up for {name}");
            LookupOutcome::NxDomain { authority: None }
        }
    }

    const IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

    fn listed() -> LookupOutcome {
        LookupOutcome::Addresses(vec![Ipv4Addr::new(127, 0, 0, 2)])
    }

    #[tokio::test]
    async fn test_one_sorted_result_per_distinct_zone() {
        let lookup = StaticLookup::new()
            .answer("10.2.0.192.b.example", listed())
            .answer("10.2.0.192.c.example", LookupOutcome::Timeout);
        let prober = ZoneProber::new(lookup.shared());

        let zones = ["c.example", "a.example", "b.example", "a.example"];
        let results = check_ip(&prober, IP, &zones, 4).await.unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.zone.as_str()).collect();
        assert_eq!(names, vec!["a.example", "b.example", "c.example"]);
        assert_eq!(results[0].status, ProbeStatus::NotListed);
        assert_eq!(results[1].status, ProbeStatus::Listed);
        assert_eq!(results[2].status, ProbeStatus::Unknown);
    }

    #[tokio::test]
    async fn test_empty_zone_list_is_rejected() {
        let prober = ZoneProber::new(StaticLookup::new().shared());
        let zones: [&str; 0] = [];
        let err = check_ip(&prober, IP, &zones, 4).await.unwrap_err();
        assert!(matches!(err, ProbeError::EmptyZoneList));
    }

    #[tokio::test]
    async fn test_zero_limit_still_makes_progress() {
        let prober = ZoneProber::new(StaticLookup::new().shared());
        let results = check_ip(&prober, IP, &["a.example", "b.example"], 0)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_probes_run_in_parallel_up_to_limit() {
        let lookup = StaticLookup::new().delay(Duration::from_millis(100));
        let prober = ZoneProber::new(lookup.shared()).timeout(Duration::from_secs(2));
        let zones: Vec<String> = (0..6).map(|i| format!("z{i}.example")).collect();

        let start = Instant::now();
        let results = check_ip(&prober, IP, &zones, 6).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 6);
        assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_limit_of_one_serializes_probes() {
        let lookup = StaticLookup::new().delay(Duration::from_millis(40));
        let prober = ZoneProber::new(lookup.shared()).timeout(Duration::from_secs(2));
        let zones = ["a.example", "b.example", "c.example"];

        let start = Instant::now();
        check_ip(&prober, IP, &zones, 1).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_every_probe_reaches_tracker() {
        let zones = ["a.example", "b.example", "c.example"];
        let tracker = Arc::new(HealthTracker::new(zones).unwrap());
        let lookup = StaticLookup::new().answer("10.2.0.192.c.example", LookupOutcome::Timeout);
        let prober = ZoneProber::new(lookup.shared()).with_tracker(Arc::clone(&tracker));

        check_ip(&prober, IP, &zones, 2).await.unwrap();

        for zone in ["a.example", "b.example"] {
            assert_eq!(tracker.snapshot(zone).unwrap().successful_checks(), 1);
        }
        let c = tracker.snapshot("c.example").unwrap();
        assert_eq!(c.checks_performed(), 1);
        assert!(c.is_broken());
    }

    #[tokio::test]
    async fn test_dead_task_becomes_unknown_and_is_recorded() {
        let zones = ["a.example", "boom.example"];
        let tracker = Arc::new(HealthTracker::new(zones).unwrap());
        let prober = ZoneProber::new(Arc::new(PanicOn("boom.example")))
            .with_tracker(Arc::clone(&tracker));

        let results = check_ip(&prober, IP, &zones, 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].zone, "a.example");
        assert_eq!(results[0].status, ProbeStatus::NotListed);
        assert_eq!(results[1].zone, "boom.example");
        assert_eq!(results[1].status, ProbeStatus::Unknown);
        assert_eq!(results[1].failure, Some(FailureKind::UnknownError));

        let boom = tracker.snapshot("boom.example").unwrap();
        assert_eq!(boom.checks_performed(), 1);
        assert_eq!(boom.failed_checks(), 1);
        assert_eq!(boom.failure_types()[&FailureKind::UnknownError], 1);
        assert_eq!(tracker.snapshot("a.example").unwrap().successful_checks(), 1);
    }

    #[tokio::test]
    async fn test_zone_missing_from_tracker_fails_the_check() {
        let tracker = Arc::new(HealthTracker::new(["a.example"]).unwrap());
        let prober = ZoneProber::new(StaticLookup::new().shared()).with_tracker(Arc::clone(&tracker));

        let err = check_ip(&prober, IP, &["a.example", "b.example"], 2)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProbeError::Core(CoreError::UnknownZone(ref z)) if z == "b.example"
        ));
    }
}
