//! Session and retry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use u_layout_core::ExtractConfig;

/// Retry schedule for calls to the search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a new policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor.max(1.0);
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.powi(retry.saturating_sub(1) as i32);
        Duration::from_millis((self.initial_delay_ms as f64 * factor).round() as u64)
    }
}

/// Configuration of a layout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of candidate layouts requested per search.
    pub k: usize,

    /// Ask the search service for exact room-type matches only.
    pub strict_mode: bool,

    /// Origin tag sent with layout searches.
    pub origin: String,

    pub retry: RetryPolicy,

    /// Seed of the random shuffle.
    pub shuffle_seed: u64,

    /// Capacity of the session event channel.
    pub event_capacity: usize,

    pub extract: ExtractConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            k: 5,
            strict_mode: false,
            origin: "domestic".to_string(),
            retry: RetryPolicy::default(),
            shuffle_seed: 0,
            event_capacity: 64,
            extract: ExtractConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = seed;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn with_extract(mut self, extract: ExtractConfig) -> Self {
        self.extract = extract;
        self
    }
}
