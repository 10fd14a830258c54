//! Route registration and resolution.
//!
//! The router turns route descriptors into pipelines (limiter storage seeded
//! with the route's parameters, shaper bound to the shutdown signal) and
//! resolves request paths to them through a precedence-ordered trie.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

mod trie;

use trie::PathTrie;

use crate::config::{
    routes_from_json, routes_from_yaml, RouteDescriptor, STRATEGY_LEAKY_BUCKET,
};
use crate::error::{FloodgateError, Result};
use crate::limit::{AlgorithmParams, KeyedLimiter};
use crate::pipeline::RequestPipeline;
use crate::shaping::{LeakyBucketShaper, ShaperParams, TrafficShape};
use crate::storage::KeyedStorage;

/// Maps request paths to admission pipelines.
///
/// Routes are registered up front (building a route spawns background tasks
/// and requires a tokio runtime); resolution afterwards is read-only, so a
/// built router is shared behind an `Arc`.
pub struct Router {
    trie: PathTrie<RequestPipeline>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            trie: PathTrie::new(),
        }
    }

    /// Build one route's pipeline and register it under its path.
    ///
    /// Configuration errors (unknown strategy, bad parameter) surface here,
    /// at build time, never at request time; each carries the route path.
    pub fn add_route(
        &mut self,
        route: &RouteDescriptor,
        shutdown: &watch::Receiver<()>,
    ) -> Result<()> {
        let limiter = match &route.limiter {
            None => None,
            Some(descriptor) => {
                let params = AlgorithmParams::from_limiter_descriptor(descriptor)
                    .map_err(|e| route_error(&route.path, e))?;
                Some(KeyedLimiter::new(KeyedStorage::new(Some(params))))
            }
        };

        let shaper: Option<Arc<dyn TrafficShape>> = match &route.traffic {
            None => None,
            Some(descriptor) => {
                if descriptor.strategy != STRATEGY_LEAKY_BUCKET {
                    return Err(route_error(
                        &route.path,
                        FloodgateError::Config(format!(
                            "unknown traffic shaper strategy: {}",
                            descriptor.strategy
                        )),
                    ));
                }
                let params = ShaperParams::from_descriptor(descriptor)
                    .map_err(|e| route_error(&route.path, e))?;
                Some(Arc::new(LeakyBucketShaper::new(params, shutdown.clone())))
            }
        };

        info!(
            path = %route.path,
            limiter = route.limiter.as_ref().map(|d| d.strategy.as_str()).unwrap_or("none"),
            traffic = route.traffic.as_ref().map(|d| d.strategy.as_str()).unwrap_or("none"),
            "Route registered"
        );

        self.trie
            .insert(&route.path, RequestPipeline::new(limiter, shaper));
        Ok(())
    }

    /// Register every route in a JSON descriptor list, failing fast on the
    /// first malformed route.
    pub fn load_from_json(&mut self, json: &str, shutdown: &watch::Receiver<()>) -> Result<()> {
        let routes = routes_from_json(json)?;
        self.add_all(&routes, shutdown)
    }

    /// Register every route in a YAML descriptor list, failing fast on the
    /// first malformed route.
    pub fn load_from_yaml(&mut self, yaml: &str, shutdown: &watch::Receiver<()>) -> Result<()> {
        let routes = routes_from_yaml(yaml)?;
        self.add_all(&routes, shutdown)
    }

    fn add_all(&mut self, routes: &[RouteDescriptor], shutdown: &watch::Receiver<()>) -> Result<()> {
        for route in routes {
            self.add_route(route, shutdown)?;
        }
        Ok(())
    }

    /// Resolve a request path to its pipeline.
    ///
    /// `None` is a conclusive miss, not an error; the caller decides what an
    /// unconfigured path means.
    pub fn eval_route(&self, path: &str) -> Option<&RequestPipeline> {
        self.trie.lookup(path)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn route_error(path: &str, err: FloodgateError) -> FloodgateError {
    let detail = match err {
        FloodgateError::Config(msg) => msg,
        other => other.to_string(),
    };
    FloodgateError::Config(format!("route '{}': {}", path, detail))
}
