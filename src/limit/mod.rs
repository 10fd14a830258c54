//! Rate limiting algorithm evaluators.
//!
//! Each algorithm is a per-key decision state machine behind the
//! [`Evaluable`] capability trait. The set of algorithms is closed, so
//! construction goes through the [`AlgorithmParams`] tagged variant rather
//! than compile-time generics: route building parses a descriptor into
//! params once, and keyed storage stamps out evaluators from them on demand.

use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod fixed_window;
pub mod keyed;
pub mod leaky_bucket;
pub mod response;
pub mod sliding_window_log;
pub mod token_bucket;

pub use fixed_window::FixedWindowEvaluator;
pub use keyed::KeyedLimiter;
pub use leaky_bucket::LeakyBucketEvaluator;
pub use response::{AlgorithmResponse, DecisionHandle, DecisionSender};
pub use sliding_window_log::SlidingWindowLogEvaluator;
pub use token_bucket::TokenBucketEvaluator;

use crate::config::{
    StrategyDescriptor, STRATEGY_FIXED_WINDOW, STRATEGY_LEAKY_BUCKET,
    STRATEGY_SLIDING_WINDOW_LOG, STRATEGY_TOKEN_BUCKET,
};
use crate::error::{FloodgateError, Result};

/// Capability interface shared by all algorithm evaluators.
///
/// A single evaluator instance serves many concurrent callers for the same
/// key; implementations serialize their state mutation internally so one
/// evaluation completes fully before the next begins.
pub trait Evaluable: Send + Sync {
    /// Evaluate one request at the given instant.
    fn eval(&self, now: Instant) -> AlgorithmResponse;
}

/// Construction parameters for one evaluator, selected at route-build time.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmParams {
    /// Counter reset every `reset_interval`.
    FixedWindow {
        capacity: u64,
        reset_interval: Duration,
    },
    /// Timestamp log pruned to a moving `window_size`.
    SlidingWindowLog {
        capacity: usize,
        window_size: Duration,
    },
    /// Token balance refilled at `refill_rate` per second.
    TokenBucket {
        capacity: f64,
        refill_rate: f64,
        request_cost: f64,
    },
    /// Bounded queue drained at `drop_per_second`.
    LeakyBucket {
        capacity: usize,
        drop_per_second: f64,
    },
}

impl AlgorithmParams {
    /// Parse limiter params from a strategy descriptor.
    ///
    /// `leaky_bucket` is a traffic-shaping strategy and is rejected here;
    /// the per-key queueing variant is only built programmatically.
    pub fn from_limiter_descriptor(descriptor: &StrategyDescriptor) -> Result<Self> {
        match descriptor.strategy.as_str() {
            STRATEGY_FIXED_WINDOW => Ok(Self::FixedWindow {
                capacity: descriptor.require_count("capacity")?,
                reset_interval: descriptor.require_seconds("reset_interval")?,
            }),
            STRATEGY_SLIDING_WINDOW_LOG => Ok(Self::SlidingWindowLog {
                capacity: descriptor.require_count("capacity")? as usize,
                window_size: descriptor.require_seconds("window_size")?,
            }),
            STRATEGY_TOKEN_BUCKET => Ok(Self::TokenBucket {
                capacity: descriptor.require_rate("capacity")?,
                refill_rate: descriptor.require_rate("refill_rate")?,
                request_cost: descriptor.require_rate("request_cost")?,
            }),
            STRATEGY_LEAKY_BUCKET => Err(FloodgateError::Config(
                "leaky_bucket is a traffic shaping strategy, not a limiter".to_string(),
            )),
            other => Err(FloodgateError::Config(format!(
                "unknown limiter strategy: {}",
                other
            ))),
        }
    }

    /// Build a fresh evaluator from these parameters.
    ///
    /// Leaky bucket construction spawns its release task and requires a
    /// tokio runtime.
    pub fn build(&self) -> Arc<dyn Evaluable> {
        match *self {
            Self::FixedWindow {
                capacity,
                reset_interval,
            } => Arc::new(FixedWindowEvaluator::new(capacity, reset_interval)),
            Self::SlidingWindowLog {
                capacity,
                window_size,
            } => Arc::new(SlidingWindowLogEvaluator::new(capacity, window_size)),
            Self::TokenBucket {
                capacity,
                refill_rate,
                request_cost,
            } => Arc::new(TokenBucketEvaluator::new(capacity, refill_rate, request_cost)),
            Self::LeakyBucket {
                capacity,
                drop_per_second,
            } => Arc::new(LeakyBucketEvaluator::new(capacity, drop_per_second)),
        }
    }
}
