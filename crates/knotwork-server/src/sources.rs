//! Collaborators that hand completed candidate batches to the engine

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::future::join_all;
use knotwork_core::{CandidateBatch, ProgressSink};
use tracing::warn;

/// Produces one batch of node/link candidates.
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Label recorded as the batch source.
    fn name(&self) -> String;

    async fn fetch(&self) -> anyhow::Result<CandidateBatch>;
}

/// Reads a batch from a JSON file shaped `{ "nodes": [...], "links": [...] }`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSource { path: path.into() }
    }
}

#[async_trait]
impl FactSource for JsonFileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> anyhow::Result<CandidateBatch> {
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let mut batch: CandidateBatch = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        if batch.source.is_empty() {
            batch.source = self.name();
        }
        Ok(batch)
    }
}

/// Fetch every source concurrently. A failed source becomes an error batch,
/// which the merge engine skips.
pub async fn gather(sources: &[Box<dyn FactSource>], progress: &dyn ProgressSink) -> Vec<CandidateBatch> {
    let results = join_all(sources.iter().map(|source| source.fetch())).await;
    sources
        .iter()
        .zip(results)
        .map(|(source, result)| match result {
            Ok(batch) => {
                progress.report(&format!(
                    "Collected {} nodes and {} links from {}",
                    batch.nodes.len(),
                    batch.links.len(),
                    batch.source
                ));
                batch
            }
            Err(e) => {
                warn!("Skipping source {}: {:#}", source.name(), e);
                progress.report(&format!("Skipped {}: {:#}", source.name(), e));
                CandidateBatch {
                    source: source.name(),
                    error: Some(format!("{:#}", e)),
                    ..CandidateBatch::default()
                }
            }
        })
        .collect()
}
