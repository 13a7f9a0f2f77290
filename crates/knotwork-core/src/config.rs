//! Engine configuration
//!
//! Defaults match the production thresholds. A TOML file can override any
//! subset; `KNOTWORK_*` environment variables are applied last.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "knotwork.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analytics: AnalyticsTiers,
    pub selection: SelectionConfig,
    pub cache: CacheConfig,
    /// Worker threads for CPU-bound processing; 0 means one per core.
    pub worker_threads: usize,
    /// Jobs that may queue before submitters wait.
    pub queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            analytics: AnalyticsTiers::default(),
            selection: SelectionConfig::default(),
            cache: CacheConfig::default(),
            worker_threads: 0,
            queue_depth: 32,
        }
    }
}

/// Node-count boundaries selecting among analytics strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsTiers {
    pub betweenness_exact_max: usize,
    pub betweenness_approx_max: usize,
    pub betweenness_pivot_ratio: f64,
    pub betweenness_pivot_min: usize,
    pub betweenness_pivot_max: usize,
    pub community_greedy_max: usize,
    pub community_lpa_max: usize,
    pub label_propagation_max_rounds: usize,
    pub pagerank_max: usize,
    pub pagerank_damping: f64,
    pub pagerank_max_iter: usize,
    pub pagerank_tolerance: f64,
    /// Seed for every randomized step.
    pub seed: u64,
}

impl Default for AnalyticsTiers {
    fn default() -> Self {
        AnalyticsTiers {
            betweenness_exact_max: 380,
            betweenness_approx_max: 2400,
            betweenness_pivot_ratio: 0.12,
            betweenness_pivot_min: 20,
            betweenness_pivot_max: 180,
            community_greedy_max: 550,
            community_lpa_max: 3200,
            label_propagation_max_rounds: 100,
            pagerank_max: 5200,
            pagerank_damping: 0.85,
            pagerank_max_iter: 60,
            pagerank_tolerance: 1.0e-4,
            seed: 42,
        }
    }
}

/// Inclusive clamp range and default for a requested size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitBounds {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

impl LimitBounds {
    pub fn clamp(&self, requested: Option<i64>) -> usize {
        let value = requested.unwrap_or(self.default as i64);
        // An inverted range resolves to `min`.
        value.min(self.max as i64).max(self.min as i64) as usize
    }

    fn validate(&self, name: &str) -> Result<(), GraphError> {
        if self.min > self.max {
            return Err(GraphError::Config(format!(
                "selection.{name}: min {} exceeds max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub nodes: LimitBounds,
    pub links: LimitBounds,
    /// Suggested increments for a client's "load more" control.
    pub node_step: usize,
    pub link_step: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            nodes: LimitBounds { min: 120, max: 7000, default: 700 },
            links: LimitBounds { min: 200, max: 40000, default: 2600 },
            node_step: 300,
            link_step: 1200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { capacity: 4 }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, GraphError> {
        let config: Self = toml::from_str(s).map_err(|e| GraphError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot describe a usable limit range.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.selection.nodes.validate("nodes")?;
        self.selection.links.validate("links")
    }

    /// Load `path`, or `knotwork.toml` in the working directory when present.
    pub fn load(path: Option<&Path>) -> Result<Self, GraphError> {
        let config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None if Path::new(CONFIG_FILE).exists() => {
                Self::from_toml_str(&std::fs::read_to_string(CONFIG_FILE)?)?
            }
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `KNOTWORK_*` overrides resolved through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());
        if let Some(limit) = read("KNOTWORK_NODE_LIMIT") {
            self.selection.nodes.default = limit;
        }
        if let Some(limit) = read("KNOTWORK_LINK_LIMIT") {
            self.selection.links.default = limit;
        }
        if let Some(capacity) = read("KNOTWORK_CACHE_CAPACITY") {
            self.cache.capacity = capacity.max(1);
        }
        if let Some(workers) = read("KNOTWORK_WORKERS") {
            self.worker_threads = workers;
        }
        self
    }
}
