//! Per-provider token bucket rate limiting.
//!
//! Each provider gets its own bucket. The failover adapter checks the
//! bucket *before* attempting a call: an empty primary bucket routes the
//! request to the fallback instead of burning a doomed attempt against
//! the quota.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use tracing::warn;

/// Rate limit settings for one provider.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sustained request budget per minute.
    pub requests_per_minute: u32,
    /// Burst headroom above the sustained rate.
    pub burst_capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_capacity: 10.0,
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn new(config: RateLimitConfig) -> Self {
        Self {
            tokens: config.burst_capacity,
            last_update: Instant::now(),
            rate: f64::from(config.requests_per_minute) / 60.0,
            capacity: config.burst_capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Thread-safe token buckets keyed by provider id.
///
/// Buckets are created on first use from the configured limits, or
/// defaults when a provider has no explicit configuration.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    configs: HashMap<String, RateLimitConfig>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            configs: HashMap::new(),
        }
    }

    /// Set the limits for a provider. Replaces any live bucket so the new
    /// limits take effect immediately.
    pub fn configure(mut self, provider: &str, config: RateLimitConfig) -> Self {
        self.configs.insert(provider.to_string(), config);
        self.lock().remove(provider);
        self
    }

    /// Recover from a poisoned mutex: the worst case is slightly wrong
    /// accounting, which beats refusing every request.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Take a token for the provider if one is available.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let mut buckets = self.lock();
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::new(self.config_for(provider)));
        bucket.try_acquire()
    }

    /// Empty a provider's bucket, used when the provider itself reports
    /// quota exhaustion: later requests skip it until tokens refill at
    /// the configured rate.
    pub fn drain(&self, provider: &str) {
        let mut buckets = self.lock();
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::new(self.config_for(provider)));
        bucket.refill();
        bucket.tokens = 0.0;
    }

    /// Remaining tokens for a provider, without taking one.
    pub fn remaining(&self, provider: &str) -> f64 {
        let mut buckets = self.lock();
        match buckets.get_mut(provider) {
            Some(bucket) => {
                bucket.refill();
                bucket.tokens
            }
            None => self.config_for(provider).burst_capacity,
        }
    }

    fn config_for(&self, provider: &str) -> RateLimitConfig {
        self.configs.get(provider).copied().unwrap_or_default()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_burst_then_empty() {
        let limiter = RateLimiter::new().configure(
            "alpha_vantage",
            RateLimitConfig {
                requests_per_minute: 60,
                burst_capacity: 3.0,
            },
        );

        assert!(limiter.try_acquire("alpha_vantage"));
        assert!(limiter.try_acquire("alpha_vantage"));
        assert!(limiter.try_acquire("alpha_vantage"));
        assert!(!limiter.try_acquire("alpha_vantage"));
    }

    #[test]
    fn test_buckets_are_isolated_per_provider() {
        let limiter = RateLimiter::new().configure(
            "alpha_vantage",
            RateLimitConfig {
                requests_per_minute: 60,
                burst_capacity: 1.0,
            },
        );

        assert!(limiter.try_acquire("alpha_vantage"));
        assert!(!limiter.try_acquire("alpha_vantage"));
        // yahoo has its own (default) bucket
        assert!(limiter.try_acquire("yahoo"));
    }

    #[test]
    fn test_refill_over_time() {
        let limiter = RateLimiter::new().configure(
            "fast",
            RateLimitConfig {
                requests_per_minute: 6000, // 100/sec for a fast test
                burst_capacity: 1.0,
            },
        );

        assert!(limiter.try_acquire("fast"));
        assert!(!limiter.try_acquire("fast"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.try_acquire("fast"));
    }

    #[test]
    fn test_drain_empties_the_bucket() {
        let limiter = RateLimiter::new();
        assert!(limiter.try_acquire("alpha_vantage"));
        limiter.drain("alpha_vantage");
        assert!(!limiter.try_acquire("alpha_vantage"));
        assert!(limiter.remaining("alpha_vantage") < 1.0);
    }

    #[test]
    fn test_remaining_reflects_spend() {
        let limiter = RateLimiter::new().configure(
            "alpha_vantage",
            RateLimitConfig {
                requests_per_minute: 60,
                burst_capacity: 5.0,
            },
        );

        assert!((limiter.remaining("alpha_vantage") - 5.0).abs() < 0.01);
        limiter.try_acquire("alpha_vantage");
        limiter.try_acquire("alpha_vantage");
        assert!((limiter.remaining("alpha_vantage") - 3.0).abs() < 0.1);
    }
}
