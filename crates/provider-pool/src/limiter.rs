//! Per-endpoint token-bucket rate limiting.
//!
//! Every RPC call claims one token from the bucket keyed on its endpoint
//! name and blocks until a token is available or the call deadline expires.
//! Buckets refill continuously at the endpoint's configured
//! requests-per-second cap and hold at most one second of burst.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{PoolError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN BUCKET
// ═══════════════════════════════════════════════════════════════════════════════

/// One endpoint's bucket state.
#[derive(Debug)]
struct Bucket {
    /// Refill rate in tokens per second.
    rate: f64,
    /// Maximum tokens held (one second of burst).
    capacity: f64,
    /// Current token count.
    tokens: f64,
    /// Last refill instant.
    refilled_at: Instant,
}

impl Bucket {
    fn new(rps: u32) -> Self {
        let rate = f64::from(rps.max(1));
        Self {
            rate,
            capacity: rate,
            tokens: rate,
            refilled_at: Instant::now(),
        }
    }

    /// Refill by elapsed time, then try to take one token.
    ///
    /// Returns `Ok(())` on success, or the duration until the next token.
    fn try_take(&mut self, now: Instant) -> std::result::Result<(), Duration> {
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.refilled_at = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(deficit / self.rate))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RATE LIMITER
// ═══════════════════════════════════════════════════════════════════════════════

/// Token buckets keyed by endpoint name.
///
/// Shared by the connection manager, health probe, and backfill scanner so
/// that every path to an endpoint draws from the same budget.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the bucket for an endpoint.
    pub fn register(&self, name: impl Into<String>, rps: u32) {
        self.buckets.insert(name.into(), Mutex::new(Bucket::new(rps)));
    }

    /// Claim one token for `name`, waiting until one is available or the
    /// deadline passes.
    ///
    /// Unregistered names pass through unthrottled; the registry validates
    /// configuration, not the limiter.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DeadlineExpired`] when no token becomes
    /// available before `deadline`.
    pub async fn acquire(&self, name: &str, deadline: Instant) -> Result<()> {
        loop {
            let wait = {
                let Some(bucket) = self.buckets.get(name) else {
                    return Ok(());
                };
                let mut bucket = bucket.lock();
                match bucket.try_take(Instant::now()) {
                    Ok(()) => return Ok(()),
                    Err(wait) => wait,
                }
            };

            let now = Instant::now();
            if now + wait > deadline {
                trace!(name, ?wait, "Rate limit token unavailable before deadline");
                return Err(PoolError::DeadlineExpired {
                    endpoint: name.to_string(),
                });
            }
            tokio::time::sleep(wait).await;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_up_to_capacity_is_immediate() {
        let limiter = RateLimiter::new();
        limiter.register("primary", 10);

        let deadline = Instant::now() + Duration::from_millis(50);
        for _ in 0..10 {
            limiter.acquire("primary", deadline).await.expect("token");
        }
    }

    #[tokio::test]
    async fn exhausted_bucket_expires_at_deadline() {
        let limiter = RateLimiter::new();
        limiter.register("primary", 1);

        let deadline = Instant::now() + Duration::from_millis(10);
        limiter.acquire("primary", deadline).await.expect("token");

        // Bucket now empty; the next token is ~1s away, past the deadline.
        let err = limiter
            .acquire("primary", deadline)
            .await
            .expect_err("should expire");
        assert!(matches!(err, PoolError::DeadlineExpired { .. }));
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let limiter = RateLimiter::new();
        limiter.register("primary", 200);

        let deadline = Instant::now() + Duration::from_secs(5);
        for _ in 0..200 {
            limiter.acquire("primary", deadline).await.expect("token");
        }

        // Empty now; the next token arrives after ~5ms of refill.
        limiter
            .acquire("primary", Instant::now() + Duration::from_secs(2))
            .await
            .expect("refilled token");
    }

    #[tokio::test]
    async fn unregistered_endpoint_is_unthrottled() {
        let limiter = RateLimiter::new();
        let deadline = Instant::now() + Duration::from_millis(1);
        for _ in 0..100 {
            limiter.acquire("unknown", deadline).await.expect("token");
        }
    }

    #[test]
    fn bucket_caps_at_capacity() {
        let mut bucket = Bucket::new(5);
        // A long idle period must not accumulate more than one second of burst.
        let later = Instant::now() + Duration::from_secs(60);
        bucket.try_take(later).expect("token");
        assert!(bucket.tokens <= bucket.capacity);
    }
}
