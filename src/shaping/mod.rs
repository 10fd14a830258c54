//! Traffic shaping: deferred admission at a fixed release rate.

use async_trait::async_trait;

use crate::limit::DecisionHandle;

pub mod leaky_bucket;

pub use leaky_bucket::{LeakyBucketShaper, ShaperParams};

/// Capability interface for traffic shapers.
///
/// A shaper accepts every request handed to it and answers later through a
/// decision handle; admission control (denial) is the limiter's job.
#[async_trait]
pub trait TrafficShape: Send + Sync {
    /// Submit a request for shaped release.
    ///
    /// Suspends while the shaper's queue is full. The returned handle
    /// resolves `true` once the request is released; after shaper shutdown
    /// the handle never resolves.
    async fn add_request(&self) -> DecisionHandle;
}
