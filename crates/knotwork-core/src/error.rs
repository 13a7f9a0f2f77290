//! Error types for the graph core

use thiserror::Error;

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph cache entry {0} expired, re-run processing")]
    CacheExpired(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a candidate was rejected by the merge engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("node candidate has no id")]
    MissingNodeId,

    #[error("link candidate is missing an endpoint")]
    MissingEndpoint,

    #[error("link candidate is a self-loop on {0}")]
    SelfLoop(String),
}

/// Internal analytics failures. Never fatal to a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("non-finite weight on link {from} -> {to}")]
    NonFiniteWeight { from: String, to: String },

    #[error("pagerank failed to converge within {0} iterations")]
    PageRankDiverged(usize),
}
