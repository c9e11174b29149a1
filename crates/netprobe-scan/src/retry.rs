//! Retry with per-attempt pacing.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use netprobe_core::{ProbeConfig, ProbeResult, ProbeTarget};
use tokio::time::sleep;

use crate::probe::Probe;

/// Probe `target` up to `config.retry + 1` times.
///
/// Sleeps `config.rate_limit` after every attempt, including a successful
/// one and the last one, so a single worker never exceeds one attempt per
/// `rate_limit`. Returns the first successful result, or `None` when every
/// attempt failed. A probe that panics counts as a failed attempt.
pub async fn probe_with_retry<P: Probe>(
    probe: &P,
    target: ProbeTarget,
    config: &ProbeConfig,
) -> Option<ProbeResult> {
    for attempt in 1..=config.attempts() {
        let result = AssertUnwindSafe(async { probe.probe(target, config.timeout).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(target = %target, attempt, "Probe panicked; counted as failed");
                ProbeResult::failed_with(target, "probe panicked")
            });
        sleep(config.rate_limit).await;

        if result.success {
            return Some(result);
        }
        tracing::trace!(target = %target, attempt, "Probe attempt failed");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Fails until `succeed_on` attempts have been made.
    struct Scripted {
        calls: AtomicUsize,
        succeed_on: Option<usize>,
    }

    impl Scripted {
        fn new(succeed_on: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                succeed_on,
            }
        }
    }

    impl Probe for Scripted {
        fn probe(
            &self,
            target: ProbeTarget,
            _timeout: Duration,
        ) -> impl Future<Output = ProbeResult> + Send {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let ok = self.succeed_on == Some(call);
            async move {
                if ok {
                    ProbeResult::succeeded(target, Duration::from_millis(3))
                } else {
                    ProbeResult::failed(target)
                }
            }
        }
    }

    /// Panics on the first call, succeeds afterwards.
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    impl Probe for PanicsOnce {
        fn probe(
            &self,
            target: ProbeTarget,
            _timeout: Duration,
        ) -> impl Future<Output = ProbeResult> + Send {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call == 1 {
                    panic!("socket exploded");
                }
                ProbeResult::succeeded(target, Duration::from_millis(2))
            }
        }
    }

    fn config(retry: u32, rate_limit_ms: u64) -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_secs(1),
            retry,
            rate_limit: Duration::from_millis(rate_limit_ms),
            concurrency: 1,
        }
    }

    fn target() -> ProbeTarget {
        ProbeTarget::host(Ipv4Addr::new(10, 0, 0, 1))
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_use_every_attempt_and_sleep_after_each() {
        let probe = Scripted::new(None);
        let start = Instant::now();

        let result = probe_with_retry(&probe, target(), &config(2, 100)).await;

        assert!(result.is_none());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success_after_pacing() {
        let probe = Scripted::new(Some(2));
        let start = Instant::now();

        let result = probe_with_retry(&probe, target(), &config(5, 100)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.latency_ms, Some(3.0));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_means_single_attempt() {
        let probe = Scripted::new(Some(1));
        let start = Instant::now();

        assert!(probe_with_retry(&probe, target(), &config(0, 250)).await.is_some());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_attempt_is_a_failure_and_retried() {
        let probe = PanicsOnce {
            calls: AtomicUsize::new(0),
        };
        let start = Instant::now();

        let result = probe_with_retry(&probe, target(), &config(1, 100)).await;

        assert!(result.is_some_and(|r| r.success));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_attempt_without_retry_yields_none() {
        let probe = PanicsOnce {
            calls: AtomicUsize::new(0),
        };
        assert!(probe_with_retry(&probe, target(), &config(0, 0)).await.is_none());
    }
}
