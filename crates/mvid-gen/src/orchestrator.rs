//! Bounded fan-out/fan-in over scenes.
//!
//! Runs one job per scene concurrently under a semaphore and collects
//! results keyed by scene index. Completion order never influences result
//! order: each index owns exactly one result slot, and consumers iterate
//! the returned map in ascending index order.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::{GenError, GenResult};

/// Default number of simultaneous generation jobs per stage.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Fan-out/fan-in runner for one pipeline stage.
#[derive(Debug, Clone)]
pub struct SceneOrchestrator {
    semaphore: Arc<Semaphore>,
}

impl Default for SceneOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl SceneOrchestrator {
    /// Create an orchestrator allowing `max_concurrency` jobs in flight.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Run `job_fn` once per `(index, input)` pair, bounded by the
    /// concurrency limit.
    ///
    /// Returns exactly one entry per input index. A failing job never
    /// cancels its siblings: every submitted job runs to its own terminal
    /// result, and the caller decides what a per-index error means for
    /// the batch.
    pub async fn run<I, T, F, Fut>(
        &self,
        inputs: Vec<(usize, I)>,
        job_fn: F,
    ) -> BTreeMap<usize, GenResult<T>>
    where
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = GenResult<T>>,
    {
        let total = inputs.len();
        info!(
            jobs = total,
            limit = self.semaphore.available_permits(),
            "Starting stage fan-out"
        );

        let futures: Vec<_> = inputs
            .into_iter()
            .map(|(index, input)| {
                let semaphore = Arc::clone(&self.semaphore);
                let job = job_fn(index, input);
                async move {
                    let permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return (index, Err(GenError::Cancelled)),
                    };
                    let result = job.await;
                    drop(permit);
                    (index, result)
                }
            })
            .collect();

        let results: BTreeMap<usize, GenResult<T>> =
            join_all(futures).await.into_iter().collect();

        let failures = results.values().filter(|r| r.is_err()).count();
        if failures > 0 {
            warn!(total, failures, "Stage finished with failures");
        } else {
            info!(total, "Stage finished");
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_result_order_independent_of_completion_order() {
        // Durations inversely proportional to index: the highest index
        // finishes first, yet results must come back keyed 0..N ascending.
        let n = 8;
        let orchestrator = SceneOrchestrator::new(n);
        let inputs: Vec<(usize, ())> = (0..n).map(|i| (i, ())).collect();

        let results = orchestrator
            .run(inputs, |index, ()| async move {
                tokio::time::sleep(Duration::from_millis(((n - index) * 100) as u64)).await;
                Ok(index * 10)
            })
            .await;

        assert_eq!(results.len(), n);
        let keys: Vec<usize> = results.keys().copied().collect();
        assert_eq!(keys, (0..n).collect::<Vec<_>>());
        for (index, result) in &results {
            assert_eq!(*result.as_ref().unwrap(), index * 10);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let orchestrator = SceneOrchestrator::new(2);

        let inputs: Vec<(usize, ())> = (0..6).map(|i| (i, ())).collect();
        let results = orchestrator
            .run(inputs, |_, ()| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sibling_failure_does_not_cancel_others() {
        let completed = Arc::new(AtomicUsize::new(0));
        let orchestrator = SceneOrchestrator::new(3);
        let inputs: Vec<(usize, ())> = (0..5).map(|i| (i, ())).collect();

        let results = orchestrator
            .run(inputs, |index, ()| {
                let completed = Arc::clone(&completed);
                async move {
                    tokio::time::sleep(Duration::from_millis(10 * (index as u64 + 1))).await;
                    if index == 1 {
                        return Err(GenError::generation("scene 1 exploded"));
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(index)
                }
            })
            .await;

        // Every index has an entry; exactly one is an error.
        assert_eq!(results.len(), 5);
        assert!(results[&1].is_err());
        assert_eq!(completed.load(Ordering::SeqCst), 4);
        for index in [0usize, 2, 3, 4] {
            assert_eq!(*results[&index].as_ref().unwrap(), index);
        }
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_map() {
        let orchestrator = SceneOrchestrator::default();
        let results = orchestrator
            .run(Vec::<(usize, ())>::new(), |_, ()| async { Ok(()) })
            .await;
        assert!(results.is_empty());
    }
}
