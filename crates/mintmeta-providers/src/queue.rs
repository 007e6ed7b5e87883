//! Bounded, optionally paced execution of outbound requests.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use mintmeta_core::policy::{RateLimiter, RateLimiterConfig};
use tokio::sync::Semaphore;

/// Concurrency and pacing for a [`RequestQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum requests in flight.
    pub concurrency: usize,
    /// Optional token bucket applied before each request starts.
    pub rate_limit: Option<RateLimiterConfig>,
}

impl QueueConfig {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            rate_limit: None,
        }
    }

    /// Pace request starts to `per_second`.
    pub fn with_rate_limit(mut self, per_second: f64) -> Self {
        self.rate_limit = Some(RateLimiterConfig::per_second(per_second));
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Runs futures with at most `concurrency` in flight.
pub struct RequestQueue {
    permits: Arc<Semaphore>,
    limiter: Option<RateLimiter>,
    concurrency: usize,
}

impl RequestQueue {
    pub fn new(config: QueueConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            limiter: config.rate_limit.map(RateLimiter::new),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Wait for a slot (and a rate token), then drive `task` to completion.
    pub async fn run<F: Future>(&self, task: F) -> F::Output {
        // never closed, so the permit is always granted
        let _permit = self.permits.acquire().await;
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        task.await
    }

    /// Run every task through the queue; outputs keep input order.
    pub async fn run_all<I>(&self, tasks: I) -> Vec<<I::Item as Future>::Output>
    where
        I: IntoIterator,
        I::Item: Future,
    {
        join_all(tasks.into_iter().map(|task| self.run(task))).await
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn bounds_in_flight_tasks() {
        let queue = RequestQueue::new(QueueConfig::new(2));
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let tasks = (0..6).map(|i| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        });
        let out = queue.run_all(tasks).await;

        assert_eq!(out, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_spaces_out_starts() {
        let queue = RequestQueue::new(QueueConfig::new(10).with_rate_limit(5.0));
        let start = Instant::now();
        queue.run_all((0..3).map(|_| async {})).await;
        // one immediate start, then one every 200ms
        assert!(start.elapsed() >= Duration::from_millis(390));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(RequestQueue::new(QueueConfig::new(0)).concurrency(), 1);
    }
}
