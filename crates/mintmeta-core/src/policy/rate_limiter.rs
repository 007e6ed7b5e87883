//! Token bucket pacing.
//!
//! Tokens accrue at `refill_rate` per second up to `capacity`; each request
//! takes one. [`RateLimiter::acquire`] sleeps until a token is available, so
//! callers are paced rather than rejected.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Token bucket settings.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Burst size.
    pub capacity: f64,
    /// Tokens per second.
    pub refill_rate: f64,
}

impl RateLimiterConfig {
    /// `rate` requests per second, no burst beyond one.
    pub fn per_second(rate: f64) -> Self {
        Self {
            capacity: 1.0,
            refill_rate: rate,
        }
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(1.0)
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket.
pub struct RateLimiter {
    config: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.reserve().is_zero()
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        loop {
            let wait = self.reserve();
            if wait.is_zero() {
                return;
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently in the bucket.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().unwrap();
        self.refill(&mut bucket);
        bucket.tokens
    }

    /// Takes a token and returns zero, or returns how long until one accrues.
    fn reserve(&self) -> Duration {
        let mut bucket = self.bucket.lock().unwrap();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Duration::ZERO;
        }
        if self.config.refill_rate <= 0.0 {
            return Duration::from_secs(1);
        }
        let deficit = 1.0 - bucket.tokens;
        Duration::from_secs_f64(deficit / self.config.refill_rate).max(Duration::from_millis(1))
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_rate).min(self.config.capacity);
        bucket.last_refill = now;
    }
}
