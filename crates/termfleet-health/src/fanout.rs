//! Bounded concurrent probing.

use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::probes::{probe_target, HealthProber, ProbeResult};

/// Probe every target with at most `max_concurrency` probes in flight.
///
/// Targets without a domain are answered with a failure and never reach the
/// prober. Results come back in completion order, keyed by the caller's tag.
/// A cap of zero is treated as one.
pub async fn probe_all<K, P>(
    prober: &P,
    targets: Vec<(K, Option<String>)>,
    timeout: Duration,
    max_concurrency: usize,
) -> Vec<(K, ProbeResult)>
where
    P: HealthProber + ?Sized,
{
    stream::iter(targets)
        .map(|(key, domain)| async move {
            let result = probe_target(prober, domain.as_deref(), timeout).await;
            (key, result)
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingProber {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HealthProber for TrackingProber {
        async fn probe(&self, domain_name: &str, _timeout: Duration) -> ProbeResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.seen.lock().unwrap().push(domain_name.to_string());

            tokio::time::sleep(Duration::from_millis(20)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ProbeResult::success(200, 20)
        }
    }

    fn targets(n: usize) -> Vec<(usize, Option<String>)> {
        (0..n)
            .map(|i| (i, Some(format!("desk{}.fleet.example", i))))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let prober = TrackingProber::default();
        let results = probe_all(&prober, targets(12), Duration::from_secs(1), 3).await;

        assert_eq!(results.len(), 12);
        assert!(prober.peak.load(Ordering::SeqCst) <= 3);
        let keys: HashSet<usize> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), 12);
    }

    #[tokio::test]
    async fn test_zero_cap_still_probes() {
        let prober = TrackingProber::default();
        let results = probe_all(&prober, targets(3), Duration::from_secs(1), 0).await;

        assert_eq!(results.len(), 3);
        assert_eq!(prober.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_domains_skip_prober() {
        let prober = TrackingProber::default();
        let input = vec![
            ("a", Some("a.fleet.example".to_string())),
            ("b", None),
        ];
        let results = probe_all(&prober, input, Duration::from_secs(1), 4).await;

        assert_eq!(results.len(), 2);
        let b = results.iter().find(|(k, _)| *k == "b").unwrap();
        assert!(!b.1.success);
        assert_eq!(*prober.seen.lock().unwrap(), vec!["a.fleet.example".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_targets() {
        let prober = TrackingProber::default();
        let results: Vec<(u8, ProbeResult)> =
            probe_all(&prober, Vec::new(), Duration::from_secs(1), 4).await;
        assert!(results.is_empty());
    }
}
