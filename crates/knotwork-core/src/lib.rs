//! Knotwork Core: candidate merging, bounded views, and graph analytics

pub mod analytics;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod lenient;
pub mod merge;
pub mod model;
pub mod selector;


pub use analytics::{analyze, AnalyticsPlan, BetweennessStrategy, CommunityStrategy, Insights};
pub use cache::{GraphCache, GraphCacheEntry};
pub use config::{AnalyticsTiers, CacheConfig, EngineConfig, LimitBounds, SelectionConfig, CONFIG_FILE};
pub use engine::{derive_pinned_ids, Engine, GraphResponse, NoProgress, ProcessInput, ProgressSink, ResponseMeta};
pub use error::{AnalyticsError, GraphError, MergeError};
pub use graph::ViewGraph;
pub use merge::{GraphIndex, IngestStats, MergePolicy};
pub use model::{CandidateBatch, CanonicalGraph, Link, LinkCandidate, LinkKey, Node, NodeKind};
pub use selector::{parse_limit, select_subset, GraphView, SelectionSummary};
