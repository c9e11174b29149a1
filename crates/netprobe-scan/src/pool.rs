//! Bounded-concurrency job runner.
//!
//! Jobs are spawned onto a [`JoinSet`] with at most `workers` in flight.
//! Outcomes are handed back in completion order, each carrying the target
//! it belongs to. A job that panics or whose task is aborted becomes an
//! outcome without output for its own target and does not disturb its
//! siblings.

use std::collections::HashMap;
use std::future::Future;

use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;

/// Result of one job, tagged with its target.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOutcome<T, R> {
    pub target: T,
    /// `None` if the job panicked or its task was aborted.
    pub output: Option<R>,
}

/// Runs one job per target with a fixed worker bound.
#[derive(Debug, Clone)]
pub struct ScanPool {
    workers: usize,
    cancel: CancellationToken,
}

impl ScanPool {
    pub fn new(workers: usize, cancel: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            cancel,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` for every target and collect outcomes in completion order.
    ///
    /// `progress` and `on_outcome` are called once per completed job, in the
    /// same order as the returned vector. Once the cancellation token fires
    /// no further jobs start; jobs already running are awaited.
    pub async fn run<T, R, F, Fut>(
        &self,
        targets: Vec<T>,
        job: F,
        progress: &mut dyn ProgressSink,
        mut on_outcome: impl FnMut(&PoolOutcome<T, R>),
    ) -> Vec<PoolOutcome<T, R>>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = targets.len();
        let mut pending = targets.into_iter();
        let mut in_flight = JoinSet::new();
        let mut owners: HashMap<task::Id, T> = HashMap::new();
        let mut outcomes = Vec::with_capacity(total);
        let mut completed = 0;

        loop {
            while in_flight.len() < self.workers && !self.cancel.is_cancelled() {
                let Some(target) = pending.next() else {
                    break;
                };
                let handle = in_flight.spawn(job(target.clone()));
                owners.insert(handle.id(), target);
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };

            let (id, output) = match joined {
                Ok((id, output)) => (id, Some(output)),
                Err(e) if e.is_panic() => {
                    tracing::warn!("Probe job panicked; counted as failed");
                    (e.id(), None)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Probe task aborted; counted as failed");
                    (e.id(), None)
                }
            };

            completed += 1;
            progress.advance(completed, total);

            if let Some(target) = owners.remove(&id) {
                let outcome = PoolOutcome { target, output };
                on_outcome(&outcome);
                outcomes.push(outcome);
            }
        }

        if self.cancel.is_cancelled() && completed < total {
            tracing::info!(completed, total, "Pool stopped early");
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoProgress, RecordedProgress};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Synthetic probe: every third target succeeds, latency varies by target.
    async fn synthetic(n: u32) -> bool {
        tokio::time::sleep(Duration::from_millis(u64::from(n % 7) * 10 + 5)).await;
        n % 3 == 0
    }

    async fn successes(workers: usize) -> HashSet<u32> {
        let pool = ScanPool::new(workers, CancellationToken::new());
        let outcomes = pool
            .run((0..50u32).collect(), synthetic, &mut NoProgress, |_| {})
            .await;
        assert_eq!(outcomes.len(), 50);
        outcomes
            .into_iter()
            .filter(|o| o.output == Some(true))
            .map(|o| o.target)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn worker_count_does_not_change_success_set() {
        let serial = successes(1).await;
        let parallel = successes(8).await;
        assert_eq!(serial, parallel);
        assert_eq!(serial.len(), 17);
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_worker_bound() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = ScanPool::new(4, CancellationToken::new());

        let job = {
            let active = active.clone();
            let peak = peak.clone();
            move |_n: u32| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            }
        };

        let outcomes = pool.run((0..30u32).collect(), job, &mut NoProgress, |_| {}).await;
        assert_eq!(outcomes.len(), 30);
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn results_arrive_in_completion_order() {
        let pool = ScanPool::new(3, CancellationToken::new());
        // Longer sleeps for earlier targets.
        let outcomes = pool
            .run(
                vec![3u64, 2, 1],
                |n| async move {
                    tokio::time::sleep(Duration::from_millis(n * 100)).await;
                    n
                },
                &mut NoProgress,
                |_| {},
            )
            .await;
        let order: Vec<u64> = outcomes.iter().map(|o| o.target).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(outcomes.iter().all(|o| o.output == Some(o.target)));
    }

    #[tokio::test]
    async fn progress_reported_once_per_completion() {
        let pool = ScanPool::new(5, CancellationToken::new());
        let mut progress = RecordedProgress::default();
        let mut seen = 0;

        pool.run((0..12u32).collect(), |n| async move { n }, &mut progress, |_| seen += 1)
            .await;

        let expected: Vec<(usize, usize)> = (1..=12).map(|i| (i, 12)).collect();
        assert_eq!(progress.0, expected);
        assert_eq!(seen, 12);
    }

    #[tokio::test]
    async fn panicking_job_does_not_abort_siblings() {
        let pool = ScanPool::new(4, CancellationToken::new());
        let mut progress = RecordedProgress::default();
        let mut reported = Vec::new();
        let outcomes = pool
            .run(
                (0..10u32).collect(),
                |n| async move {
                    if n == 7 {
                        panic!("resource exhausted");
                    }
                    n * 2
                },
                &mut progress,
                |o| reported.push((o.target, o.output)),
            )
            .await;

        assert_eq!(outcomes.len(), 10);
        assert_eq!(progress.0.len(), 10);
        assert!(reported.contains(&(7, None)));
        assert!(outcomes
            .iter()
            .filter(|o| o.target != 7)
            .all(|o| o.output == Some(o.target * 2)));
        let failed: Vec<u32> = outcomes
            .iter()
            .filter(|o| o.output.is_none())
            .map(|o| o.target)
            .collect();
        assert_eq!(failed, vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_new_jobs() {
        let cancel = CancellationToken::new();
        let pool = ScanPool::new(2, cancel.clone());
        let started = Arc::new(AtomicUsize::new(0));

        let job = {
            let started = started.clone();
            let cancel = cancel.clone();
            move |n: u32| {
                let started = started.clone();
                let cancel = cancel.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    if n == 3 {
                        cancel.cancel();
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        };

        let outcomes = pool.run((0..100u32).collect(), job, &mut NoProgress, |_| {}).await;

        assert!(outcomes.len() < 100);
        assert_eq!(outcomes.len(), started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_input_returns_immediately() {
        let pool = ScanPool::new(8, CancellationToken::new());
        let mut progress = RecordedProgress::default();
        let outcomes: Vec<PoolOutcome<u32, u32>> =
            pool.run(Vec::new(), |n| async move { n }, &mut progress, |_| {}).await;
        assert!(outcomes.is_empty());
        assert!(progress.0.is_empty());
    }
}
