//! Generational key-indexed evaluator storage.
//!
//! Maps caller identifiers to live evaluator instances without unbounded
//! growth. Eviction is approximate: two rotating map generations are swapped
//! on a fixed period, so an entry survives between one and two sweep
//! intervals of inactivity before being dropped. A lookup that hits the old
//! generation promotes the entry back into the current one.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::interval;
use tracing::trace;

use crate::error::{FloodgateError, Result};
use crate::limit::{AlgorithmParams, Evaluable};

/// Default period between generation sweeps.
pub const EXPIRATION_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Key-indexed storage for per-identifier evaluators.
///
/// The generation lock guards only map mutations and the sweep's pointer
/// swap; evaluator internals carry their own locks, so storage contention is
/// independent of evaluation contention.
///
/// Construction spawns the sweep task and therefore requires a tokio
/// runtime; the task exits when the storage is dropped.
pub struct KeyedStorage {
    generations: Mutex<Generations>,
    defaults: Mutex<DefaultParams>,
}

struct Generations {
    current: HashMap<String, Arc<dyn Evaluable>>,
    old: HashMap<String, Arc<dyn Evaluable>>,
}

struct DefaultParams {
    per_key: HashMap<String, AlgorithmParams>,
    fallback: Option<AlgorithmParams>,
}

impl KeyedStorage {
    /// Create storage with the default sweep period.
    ///
    /// `fallback` seeds construction parameters for keys with no explicit
    /// default registered; a route passes its own limiter params here.
    pub fn new(fallback: Option<AlgorithmParams>) -> Arc<Self> {
        Self::with_sweep_interval(fallback, EXPIRATION_CHECK_INTERVAL)
    }

    /// Create storage with an explicit sweep period.
    pub fn with_sweep_interval(
        fallback: Option<AlgorithmParams>,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        let storage = Arc::new(Self {
            generations: Mutex::new(Generations {
                current: HashMap::new(),
                old: HashMap::new(),
            }),
            defaults: Mutex::new(DefaultParams {
                per_key: HashMap::new(),
                fallback,
            }),
        });

        tokio::spawn(sweep_loop(Arc::downgrade(&storage), sweep_interval));
        storage
    }

    /// Register construction parameters for a specific key.
    pub fn set_default_value(&self, key: &str, params: AlgorithmParams) {
        let mut defaults = self.defaults.lock();
        defaults.per_key.insert(key.to_string(), params);
    }

    /// Build a fresh evaluator for a key from its registered parameters.
    ///
    /// Fails when neither a per-key default nor a storage-wide fallback was
    /// registered; there is no hardcoded safety net.
    pub fn new_evaluator(&self, key: &str) -> Result<Arc<dyn Evaluable>> {
        let params = {
            let defaults = self.defaults.lock();
            defaults
                .per_key
                .get(key)
                .or(defaults.fallback.as_ref())
                .cloned()
        };
        match params {
            Some(params) => Ok(params.build()),
            None => Err(FloodgateError::Storage(format!(
                "no default parameters registered for key '{}'",
                key
            ))),
        }
    }

    /// Insert an evaluator into the current generation.
    pub fn store(&self, key: &str, evaluator: Arc<dyn Evaluable>) -> Result<()> {
        let mut generations = self.generations.lock();
        generations.current.insert(key.to_string(), evaluator);
        Ok(())
    }

    /// Look up an evaluator, promoting an old-generation hit.
    pub fn retrieve(&self, key: &str) -> Option<Arc<dyn Evaluable>> {
        let mut generations = self.generations.lock();
        if let Some(evaluator) = generations.current.get(key) {
            return Some(evaluator.clone());
        }
        // An old-generation hit is still live: move it back so the next
        // sweep does not drop it.
        let evaluator = generations.old.remove(key)?;
        generations
            .current
            .insert(key.to_string(), evaluator.clone());
        Some(evaluator)
    }

    /// Remove a key from both generations.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut generations = self.generations.lock();
        generations.current.remove(key);
        generations.old.remove(key);
        Ok(())
    }

    /// Number of live entries across both generations.
    pub fn len(&self) -> usize {
        let generations = self.generations.lock();
        generations.current.len() + generations.old.len()
    }

    /// Whether the storage holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rotate generations: drop the old one, demote the current one.
    fn sweep(&self) {
        let mut generations = self.generations.lock();
        let expired = generations.old.len();
        generations.old = std::mem::take(&mut generations.current);
        trace!(
            expired = expired,
            retained = generations.old.len(),
            "Storage generation sweep"
        );
    }
}

async fn sweep_loop(storage: Weak<KeyedStorage>, sweep_interval: Duration) {
    let mut ticker = interval(sweep_interval);
    // The first tick completes immediately; skip it so a fresh storage gets
    // a full interval before its first rotation.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match storage.upgrade() {
            Some(storage) => storage.sweep(),
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params() -> AlgorithmParams {
        AlgorithmParams::FixedWindow {
            capacity: 5,
            reset_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_retrieve_unknown_key_misses() {
        let storage = KeyedStorage::new(Some(params()));
        assert!(storage.retrieve("client-1").is_none());
    }

    #[tokio::test]
    async fn test_store_then_retrieve() {
        let storage = KeyedStorage::new(Some(params()));
        let evaluator = storage.new_evaluator("client-1").unwrap();
        storage.store("client-1", evaluator.clone()).unwrap();

        let found = storage.retrieve("client-1").unwrap();
        assert!(Arc::ptr_eq(&found, &evaluator));
    }

    #[tokio::test]
    async fn test_new_evaluator_without_defaults_fails() {
        let storage = KeyedStorage::new(None);
        let err = storage.new_evaluator("client-1").err().unwrap();
        assert!(err.to_string().contains("client-1"));
    }

    #[tokio::test]
    async fn test_per_key_default_overrides_fallback() {
        let storage = KeyedStorage::new(None);
        storage.set_default_value("client-1", params());

        assert!(storage.new_evaluator("client-1").is_ok());
        assert!(storage.new_evaluator("client-2").is_err());
    }

    #[tokio::test]
    async fn test_one_sweep_demotes_but_keeps_entry() {
        let storage = KeyedStorage::new(Some(params()));
        let evaluator = storage.new_evaluator("client-1").unwrap();
        storage.store("client-1", evaluator.clone()).unwrap();

        storage.sweep();

        // Still reachable from the old generation, and the hit promotes it.
        let found = storage.retrieve("client-1").unwrap();
        assert!(Arc::ptr_eq(&found, &evaluator));

        // Promotion means a second sweep must not lose it either.
        storage.sweep();
        assert!(storage.retrieve("client-1").is_some());
    }

    #[tokio::test]
    async fn test_two_sweeps_without_access_drop_entry() {
        let storage = KeyedStorage::new(Some(params()));
        let evaluator = storage.new_evaluator("client-1").unwrap();
        storage.store("client-1", evaluator).unwrap();

        storage.sweep();
        storage.sweep();
        assert!(storage.retrieve("client-1").is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_delete_clears_both_generations() {
        let storage = KeyedStorage::new(Some(params()));
        let evaluator = storage.new_evaluator("client-1").unwrap();
        storage.store("client-1", evaluator.clone()).unwrap();
        storage.sweep();
        storage.store("client-2", evaluator).unwrap();

        storage.delete("client-1").unwrap();
        storage.delete("client-2").unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_rotates_generations() {
        let storage =
            KeyedStorage::with_sweep_interval(Some(params()), Duration::from_millis(100));
        let evaluator = storage.new_evaluator("client-1").unwrap();
        storage.store("client-1", evaluator).unwrap();

        // Two untouched sweep intervals expire the entry.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(storage.retrieve("client-1").is_none());
    }
}
