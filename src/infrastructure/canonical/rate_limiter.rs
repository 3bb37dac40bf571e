//! Client-side request throttling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

/// Token bucket throttle for outbound canonical state requests.
///
/// Capacity equals the refill rate, so a burst of one second's worth of
/// requests goes through before callers start waiting.
#[derive(Clone)]
pub struct TokenBucketRateLimiter {
    state: Arc<Mutex<Bucket>>,
    capacity: f64,
    refill_rate: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// Non-positive rates are clamped to a small positive rate.
    pub fn new(requests_per_second: f64) -> Self {
        let rate = if requests_per_second > 0.0 {
            requests_per_second
        } else {
            0.1
        };
        let capacity = rate.max(1.0);
        Self {
            state: Arc::new(Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            capacity,
            refill_rate: rate,
        }
    }

    /// Wait for and consume one token.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                (1.0 - bucket.tokens) / self.refill_rate
            };

            sleep(Duration::from_secs_f64(wait.max(0.001))).await;
        }
    }

    /// Tokens available right now, including refill since the last acquire.
    pub async fn available_tokens(&self) -> f64 {
        let bucket = self.state.lock().await;
        let elapsed = bucket.last_refill.elapsed().as_secs_f64();
        (bucket.tokens + elapsed * self.refill_rate).min(self.capacity)
    }
}
