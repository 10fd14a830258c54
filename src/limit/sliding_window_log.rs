//! Sliding window log rate limiting.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::response::AlgorithmResponse;
use super::Evaluable;

/// Admission history kept as timestamps, pruned to a moving window.
///
/// Entries older than the window are dropped on every evaluation, so memory
/// is bounded by capacity rather than request rate.
pub struct SlidingWindowLogEvaluator {
    capacity: usize,
    window_size: Duration,
    logs: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLogEvaluator {
    /// Create an evaluator with an empty admission log.
    pub fn new(capacity: usize, window_size: Duration) -> Self {
        Self {
            capacity,
            window_size,
            logs: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl Evaluable for SlidingWindowLogEvaluator {
    fn eval(&self, now: Instant) -> AlgorithmResponse {
        let mut logs = self.logs.lock();

        // Admissions are appended in order, so expired entries sit at the front.
        while let Some(oldest) = logs.front() {
            if now.saturating_duration_since(*oldest) > self.window_size {
                logs.pop_front();
            } else {
                break;
            }
        }

        if logs.len() >= self.capacity {
            return AlgorithmResponse::deny();
        }

        logs.push_back(now);
        AlgorithmResponse::allow()
    }
}
