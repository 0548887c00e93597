// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Default lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
/// Upper bound on the cache lifetime (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 3600;
/// Default spacing of densified drillhole trajectory points.
pub const DEFAULT_TRAJECTORY_STEP: f64 = 1.0;
/// Default tolerance for geology boundary de-duplication.
pub const DEFAULT_BOUNDARY_EPSILON: f64 = 1e-6;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Lifetime of cache entries stored without an explicit TTL.
    pub cache_ttl_secs: u64,
    /// Spacing of densified drillhole trajectory points.
    pub trajectory_step: f64,
    /// Master-profile points closer than this to a geology boundary are skipped.
    pub boundary_epsilon: f64,
    /// Number of worker threads for batch runs.
    pub worker_threads: usize,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            cache_ttl_secs: std::env::var("XSECTION_CACHE_TTL_SECS")
                .unwrap_or_else(|_| DEFAULT_CACHE_TTL_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_CACHE_TTL_SECS)
                .min(MAX_CACHE_TTL_SECS),
            trajectory_step: std::env::var("XSECTION_TRAJECTORY_STEP")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(DEFAULT_TRAJECTORY_STEP),
            boundary_epsilon: std::env::var("XSECTION_BOUNDARY_EPSILON")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(DEFAULT_BOUNDARY_EPSILON),
            worker_threads: std::env::var("XSECTION_WORKER_THREADS")
                .unwrap_or_else(|_| num_cpus::get().to_string())
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or_else(num_cpus::get),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs.min(MAX_CACHE_TTL_SECS);
        self
    }

    pub fn with_trajectory_step(mut self, step: f64) -> Self {
        self.trajectory_step = step;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            trajectory_step: DEFAULT_TRAJECTORY_STEP,
            boundary_epsilon: DEFAULT_BOUNDARY_EPSILON,
            worker_threads: num_cpus::get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.trajectory_step, 1.0);
        assert_eq!(config.boundary_epsilon, 1e-6);
        assert!(config.worker_threads >= 1);
    }

    #[test]
    fn builders_override() {
        let config = EngineConfig::default()
            .with_cache_ttl_secs(10)
            .with_trajectory_step(0.5)
            .with_worker_threads(0);
        assert_eq!(config.cache_ttl_secs, 10);
        assert_eq!(config.trajectory_step, 0.5);
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn cache_ttl_is_bounded() {
        let config = EngineConfig::default().with_cache_ttl_secs(u64::MAX);
        assert_eq!(config.cache_ttl_secs, MAX_CACHE_TTL_SECS);
    }
}
