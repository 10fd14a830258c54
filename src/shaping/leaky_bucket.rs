//! Route-level leaky bucket shaper.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::TrafficShape;
use crate::config::StrategyDescriptor;
use crate::error::Result;
use crate::limit::{DecisionHandle, DecisionSender};

/// Construction parameters for a leaky bucket shaper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaperParams {
    /// Queue capacity before submission blocks.
    pub capacity: usize,
    /// Releases per second.
    pub drop_per_second: f64,
}

impl ShaperParams {
    /// Parse shaper params from a strategy descriptor.
    pub fn from_descriptor(descriptor: &StrategyDescriptor) -> Result<Self> {
        Ok(Self {
            capacity: descriptor.require_count("capacity")? as usize,
            drop_per_second: descriptor.require_positive_rate("drop_per_second")?,
        })
    }
}

/// A traffic shaper releasing at most one request per `1/drop_per_second`
/// seconds through a single bounded FIFO queue.
///
/// Unlike the per-key queueing limiter, one shaper instance serves a whole
/// route: every caller routed here funnels through the same queue, and
/// [`TrafficShape::add_request`] applies real backpressure by suspending the
/// caller while the queue is full.
///
/// # Shutdown
///
/// The externally supplied `watch` signal stops the release ticker and
/// terminates the background loop. Requests still queued at that point are
/// abandoned: their handles are never resolved. This is deliberate shutdown
/// behavior, not a defect; callers awaiting a decision across shutdown must
/// bound the wait themselves.
pub struct LeakyBucketShaper {
    queue: mpsc::Sender<DecisionSender>,
}

impl LeakyBucketShaper {
    /// Create a shaper and spawn its release task (requires a tokio runtime).
    pub fn new(params: ShaperParams, shutdown: watch::Receiver<()>) -> Self {
        let release_period = Duration::from_secs_f64(1.0 / params.drop_per_second);
        let (tx, rx) = mpsc::channel(params.capacity.max(1));

        tokio::spawn(release_loop(rx, release_period, shutdown));

        Self { queue: tx }
    }
}

#[async_trait]
impl TrafficShape for LeakyBucketShaper {
    async fn add_request(&self) -> DecisionHandle {
        let (sender, handle) = DecisionHandle::pair();
        // Blocks while the queue is at capacity. After shutdown the send
        // fails and the sender is dropped unresolved, which leaves the
        // handle permanently pending.
        let _ = self.queue.send(sender).await;
        handle
    }
}

async fn release_loop(
    mut queue: mpsc::Receiver<DecisionSender>,
    release_period: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + release_period, release_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Ok(sender) = queue.try_recv() {
                    sender.resolve(true);
                }
            }
            // A changed value or a dropped sender both mean shutdown.
            _ = shutdown.changed() => {
                debug!("Traffic shaper received shutdown signal, abandoning queue");
                return;
            }
        }
    }
}
