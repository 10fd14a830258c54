//! Route descriptor configuration and loading.
//!
//! This module handles the descriptor format that binds a path to a limiter
//! strategy and an optional traffic-shaping strategy. Descriptors arrive as a
//! JSON or YAML list; a load rejects the whole document on the first
//! malformed route rather than skipping it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};

/// Strategy name for the fixed window limiter.
pub const STRATEGY_FIXED_WINDOW: &str = "fixed_window";
/// Strategy name for the sliding window log limiter.
pub const STRATEGY_SLIDING_WINDOW_LOG: &str = "sliding_window_log";
/// Strategy name for the token bucket limiter.
pub const STRATEGY_TOKEN_BUCKET: &str = "token_bucket";
/// Strategy name for the leaky bucket traffic shaper.
pub const STRATEGY_LEAKY_BUCKET: &str = "leaky_bucket";

/// A named strategy with its numeric parameters.
///
/// Parameters may arrive as integers or floating point; both are accepted and
/// converted according to the target field's semantic type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    /// The strategy name (e.g. `fixed_window`).
    #[serde(rename = "type")]
    pub strategy: String,
    /// Named numeric parameters for the strategy.
    #[serde(default)]
    pub params: HashMap<String, f64>,
}

/// A single route binding: a path, an optional limiter, an optional shaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// The route path (`/a/b`, `/a/:id`, `/a/*`).
    pub path: String,
    /// Rate limiter strategy for this route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limiter: Option<StrategyDescriptor>,
    /// Traffic shaper strategy for this route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<StrategyDescriptor>,
}

/// Load a list of route descriptors from a YAML document.
pub fn routes_from_yaml(yaml: &str) -> Result<Vec<RouteDescriptor>> {
    serde_yaml::from_str(yaml)
        .map_err(|e| FloodgateError::Config(format!("Failed to parse route config: {}", e)))
}

/// Load a list of route descriptors from a JSON document.
pub fn routes_from_json(json: &str) -> Result<Vec<RouteDescriptor>> {
    serde_json::from_str(json)
        .map_err(|e| FloodgateError::Config(format!("Failed to parse route config: {}", e)))
}

/// Load route descriptors from a YAML file on disk.
pub fn routes_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<RouteDescriptor>> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading route configuration");

    let contents = std::fs::read_to_string(path)?;
    routes_from_yaml(&contents)
}

impl StrategyDescriptor {
    /// Extract an integer-valued parameter (a count or capacity).
    ///
    /// A floating point value is accepted and truncated toward zero.
    pub(crate) fn require_count(&self, name: &str) -> Result<u64> {
        let value = self.require_number(name)?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid_param(name, value));
        }
        Ok(value as u64)
    }

    /// Extract a non-negative rate or quantity parameter.
    pub(crate) fn require_rate(&self, name: &str) -> Result<f64> {
        let value = self.require_number(name)?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid_param(name, value));
        }
        Ok(value)
    }

    /// Extract a strictly positive rate parameter.
    pub(crate) fn require_positive_rate(&self, name: &str) -> Result<f64> {
        let value = self.require_number(name)?;
        if !value.is_finite() || value <= 0.0 {
            return Err(self.invalid_param(name, value));
        }
        Ok(value)
    }

    /// Extract a duration parameter given in (possibly fractional) seconds.
    pub(crate) fn require_seconds(&self, name: &str) -> Result<Duration> {
        let value = self.require_number(name)?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid_param(name, value));
        }
        Ok(Duration::from_secs_f64(value))
    }

    fn require_number(&self, name: &str) -> Result<f64> {
        self.params.get(name).copied().ok_or_else(|| {
            FloodgateError::Config(format!(
                "missing {} parameter for {} strategy",
                name, self.strategy
            ))
        })
    }

    fn invalid_param(&self, name: &str, value: f64) -> FloodgateError {
        FloodgateError::Config(format!("invalid {} parameter: {}", name, value))
    }
}
