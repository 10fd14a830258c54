//! Fixed window rate limiting.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use super::response::AlgorithmResponse;
use super::Evaluable;

/// A counter that resets to zero every fixed time interval.
///
/// Requests are admitted while the counter is below capacity within the
/// current window. A capacity of zero denies everything.
pub struct FixedWindowEvaluator {
    capacity: u64,
    reset_interval: Duration,
    state: Mutex<WindowState>,
}

struct WindowState {
    counter: u64,
    last_reset: Instant,
}

impl FixedWindowEvaluator {
    /// Create an evaluator with the window starting now.
    pub fn new(capacity: u64, reset_interval: Duration) -> Self {
        Self {
            capacity,
            reset_interval,
            state: Mutex::new(WindowState {
                counter: 0,
                last_reset: Instant::now(),
            }),
        }
    }
}

impl Evaluable for FixedWindowEvaluator {
    fn eval(&self, now: Instant) -> AlgorithmResponse {
        let mut state = self.state.lock();
        if now.saturating_duration_since(state.last_reset) >= self.reset_interval {
            state.counter = 0;
            state.last_reset = now;
        }
        if state.counter < self.capacity {
            state.counter += 1;
            AlgorithmResponse::allow()
        } else {
            AlgorithmResponse::deny()
        }
    }
}
