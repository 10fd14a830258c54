//! Per-key leaky bucket: queueing admission with timer-driven release.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant as TokioInstant, MissedTickBehavior};
use tracing::debug;

use super::response::{AlgorithmResponse, DecisionHandle, DecisionSender};
use super::Evaluable;

/// How often the idle watcher wakes to check for retirement.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// How long the evaluator may sit unused before its release task retires.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// A bounded queue drained at a fixed rate.
///
/// Each admitted request is parked on a [`DecisionHandle`] and released in
/// FIFO order, one per `1 / drop_per_second` seconds. A full queue rejects
/// synchronously rather than promising a release that cannot be honored.
///
/// The release task retires itself once the queue is empty and the evaluator
/// has been idle past its timeout, so abandoned keys do not leak tickers. A
/// retired evaluator denies synchronously until the storage sweep drops it
/// and a fresh one is built.
///
/// Construction spawns the release task and therefore requires a tokio
/// runtime. `drop_per_second` must be positive.
pub struct LeakyBucketEvaluator {
    capacity: usize,
    queue: mpsc::Sender<DecisionSender>,
    last_activity: Arc<Mutex<TokioInstant>>,
}

impl LeakyBucketEvaluator {
    /// Create an evaluator with the default idle policy.
    pub fn new(capacity: usize, drop_per_second: f64) -> Self {
        Self::with_idle_policy(capacity, drop_per_second, IDLE_TIMEOUT, IDLE_CHECK_INTERVAL)
    }

    /// Create an evaluator with an explicit idle policy.
    pub fn with_idle_policy(
        capacity: usize,
        drop_per_second: f64,
        idle_timeout: Duration,
        idle_check_interval: Duration,
    ) -> Self {
        let release_period = Duration::from_secs_f64(1.0 / drop_per_second);
        // A zero-capacity bucket never uses its channel; tokio requires a
        // non-zero buffer.
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let last_activity = Arc::new(Mutex::new(TokioInstant::now()));

        tokio::spawn(release_loop(
            rx,
            release_period,
            idle_timeout,
            idle_check_interval,
            last_activity.clone(),
        ));

        Self {
            capacity,
            queue: tx,
            last_activity,
        }
    }
}

impl Evaluable for LeakyBucketEvaluator {
    fn eval(&self, _now: Instant) -> AlgorithmResponse {
        if self.capacity == 0 {
            return AlgorithmResponse::deny();
        }
        *self.last_activity.lock() = TokioInstant::now();

        let (sender, handle) = DecisionHandle::pair();
        match self.queue.try_send(sender) {
            Ok(()) => AlgorithmResponse::delayed(handle),
            // Full queue, or the release task already retired.
            Err(_) => AlgorithmResponse::deny(),
        }
    }
}

async fn release_loop(
    mut queue: mpsc::Receiver<DecisionSender>,
    release_period: Duration,
    idle_timeout: Duration,
    idle_check_interval: Duration,
    last_activity: Arc<Mutex<TokioInstant>>,
) {
    let start = TokioInstant::now();
    let mut release = interval_at(start + release_period, release_period);
    release.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut idle_check = interval_at(start + idle_check_interval, idle_check_interval);

    loop {
        tokio::select! {
            _ = release.tick() => {
                if let Ok(sender) = queue.try_recv() {
                    sender.resolve(true);
                }
            }
            _ = idle_check.tick() => {
                let idle = last_activity.lock().elapsed() > idle_timeout;
                if idle && queue.is_empty() {
                    debug!("Leaky bucket idle past timeout, retiring release task");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn decision(mut handle: DecisionHandle) -> bool {
        handle.decision().await
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_request_is_released_true() {
        let evaluator = LeakyBucketEvaluator::new(4, 10.0);
        let mut response = evaluator.eval(Instant::now());

        assert!(response.is_delayed());
        assert!(response.is_allowed());
        let handle = response.take_handle().unwrap();
        assert!(decision(handle).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_rejects_synchronously() {
        // One slot and a glacial drain: the second request must be turned
        // away immediately, not parked.
        let evaluator = LeakyBucketEvaluator::new(1, 0.001);

        let first = evaluator.eval(Instant::now());
        assert!(first.is_delayed());

        let second = evaluator.eval(Instant::now());
        assert!(!second.is_delayed());
        assert!(!second.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_are_spaced_by_drain_period() {
        let evaluator = LeakyBucketEvaluator::new(4, 10.0);
        let started = TokioInstant::now();

        let mut first = evaluator.eval(Instant::now()).take_handle().unwrap();
        let mut second = evaluator.eval(Instant::now()).take_handle().unwrap();

        assert!(first.decision().await);
        let first_latency = started.elapsed();
        assert!(second.decision().await);
        let second_latency = started.elapsed();

        assert!(first_latency >= Duration::from_millis(100));
        assert!(second_latency >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_evaluator_retires_and_denies() {
        let evaluator = LeakyBucketEvaluator::with_idle_policy(
            2,
            10.0,
            Duration::from_millis(500),
            Duration::from_millis(100),
        );

        let handle = evaluator.eval(Instant::now()).take_handle().unwrap();
        assert!(decision(handle).await);

        // Let the watcher observe an empty queue past the idle timeout.
        tokio::time::sleep(Duration::from_secs(2)).await;

        let response = evaluator.eval(Instant::now());
        assert!(!response.is_delayed());
        assert!(!response.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_work_defers_retirement() {
        let evaluator = LeakyBucketEvaluator::with_idle_policy(
            2,
            // Slow drain: the queued request outlives several idle checks.
            1.0,
            Duration::from_millis(200),
            Duration::from_millis(100),
        );

        let handle = evaluator.eval(Instant::now()).take_handle().unwrap();
        // The queue is non-empty, so the watcher must keep the task alive
        // long enough to release it.
        let released = timeout(Duration::from_secs(5), decision(handle)).await;
        assert_eq!(released.ok(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_always_denies() {
        let evaluator = LeakyBucketEvaluator::new(0, 10.0);
        let response = evaluator.eval(Instant::now());
        assert!(!response.is_allowed());
        assert!(!response.is_delayed());
    }
}
