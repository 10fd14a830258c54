//! Keyed limiter: lazy per-identifier evaluator management.

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::response::AlgorithmResponse;
use crate::error::Result;
use crate::storage::KeyedStorage;

/// A rate limiter that keeps one evaluator per caller identifier.
///
/// Evaluators are created lazily from the storage's registered defaults on
/// the first request for a key, and expire through the storage's
/// generational sweep. One key's evaluation never blocks another's.
pub struct KeyedLimiter {
    storage: Arc<KeyedStorage>,
}

impl KeyedLimiter {
    /// Create a limiter over the given storage.
    pub fn new(storage: Arc<KeyedStorage>) -> Self {
        Self { storage }
    }

    /// Evaluate one request for the given caller identifier.
    ///
    /// Fails only when a new evaluator is needed and the storage has no
    /// default parameters for the key; that is a hard failure for this
    /// request and is never retried internally.
    pub fn handle(&self, identifier: &str) -> Result<AlgorithmResponse> {
        let evaluator = match self.storage.retrieve(identifier) {
            Some(evaluator) => evaluator,
            None => {
                debug!(key = %identifier, "Creating evaluator for new key");
                let evaluator = self.storage.new_evaluator(identifier)?;
                self.storage.store(identifier, evaluator.clone())?;
                evaluator
            }
        };
        Ok(evaluator.eval(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limit::AlgorithmParams;
    use std::time::Duration;

    fn limiter_with_capacity(capacity: u64) -> KeyedLimiter {
        let storage = KeyedStorage::new(Some(AlgorithmParams::FixedWindow {
            capacity,
            reset_interval: Duration::from_secs(60),
        }));
        KeyedLimiter::new(storage)
    }

    #[tokio::test]
    async fn test_first_request_creates_evaluator() {
        let limiter = limiter_with_capacity(1);
        assert!(limiter.handle("client-1").unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_state_persists_across_requests() {
        let limiter = limiter_with_capacity(2);

        assert!(limiter.handle("client-1").unwrap().is_allowed());
        assert!(limiter.handle("client-1").unwrap().is_allowed());
        assert!(!limiter.handle("client-1").unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let limiter = limiter_with_capacity(1);

        assert!(limiter.handle("client-1").unwrap().is_allowed());
        assert!(!limiter.handle("client-1").unwrap().is_allowed());
        // A different identifier gets its own counter.
        assert!(limiter.handle("client-2").unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_missing_defaults_propagate_as_error() {
        let limiter = KeyedLimiter::new(KeyedStorage::new(None));
        assert!(limiter.handle("client-1").is_err());
    }
}
