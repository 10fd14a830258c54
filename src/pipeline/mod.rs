//! Request pipeline: one rate limiter composed with an optional shaper.

use std::sync::Arc;
use tracing::trace;

pub mod response;

pub use response::PipelineResponse;

use crate::error::Result;
use crate::limit::KeyedLimiter;
use crate::shaping::TrafficShape;

/// The admission pipeline attached to one route.
///
/// Evaluation order is fixed: the limiter decides first and a denial
/// short-circuits the chain, so the shaper only ever sees admitted traffic.
/// The pipeline holds references to both components but owns neither
/// lifetime; they are constructed and attached at route-build time.
pub struct RequestPipeline {
    limiter: Option<KeyedLimiter>,
    shaper: Option<Arc<dyn TrafficShape>>,
}

impl RequestPipeline {
    /// Assemble a pipeline from its optional stages.
    pub fn new(limiter: Option<KeyedLimiter>, shaper: Option<Arc<dyn TrafficShape>>) -> Self {
        Self { limiter, shaper }
    }

    /// Evaluate one request for the given caller identifier.
    ///
    /// Storage failures (an unseen key with no registered defaults) are hard
    /// failures for this request; nothing is retried internally.
    pub async fn handle_request(&self, identifier: &str) -> Result<PipelineResponse> {
        let admitted = match &self.limiter {
            None => true,
            Some(limiter) => {
                let mut decision = limiter.handle(identifier)?;
                match decision.take_handle() {
                    None => decision.is_allowed(),
                    // A delayed admission with no shaper behind it passes the
                    // limiter's own handle through as the async response.
                    Some(handle) if self.shaper.is_none() => {
                        return Ok(PipelineResponse::asynchronous(handle));
                    }
                    // With a shaper configured the delayed decision must be
                    // awaited first: a deny may never reach the shaper.
                    Some(mut handle) => handle.decision().await,
                }
            }
        };

        if !admitted {
            trace!(key = %identifier, "Request denied by rate limiter");
            return Ok(PipelineResponse::sync(false));
        }

        match &self.shaper {
            None => Ok(PipelineResponse::sync(true)),
            Some(shaper) => {
                let handle = shaper.add_request().await;
                Ok(PipelineResponse::asynchronous(handle))
            }
        }
    }
}
