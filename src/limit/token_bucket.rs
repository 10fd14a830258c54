//! Token bucket rate limiting.

use parking_lot::Mutex;
use std::time::Instant;

use super::response::AlgorithmResponse;
use super::Evaluable;

/// A continuously replenished token balance consumed per request.
///
/// Tokens accrue at `refill_rate` per second up to `capacity`; each admitted
/// request subtracts `request_cost`. A refill rate of zero is legal and means
/// the bucket never replenishes.
pub struct TokenBucketEvaluator {
    capacity: f64,
    refill_rate: f64,
    request_cost: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketEvaluator {
    /// Create an evaluator with a full bucket.
    pub fn new(capacity: f64, refill_rate: f64, request_cost: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            request_cost,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }
}

impl Evaluable for TokenBucketEvaluator {
    fn eval(&self, now: Instant) -> AlgorithmResponse {
        let mut state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= self.request_cost {
            state.tokens -= self.request_cost;
            AlgorithmResponse::allow()
        } else {
            AlgorithmResponse::deny()
        }
    }
}
