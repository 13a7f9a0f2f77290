//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use knotwork_core::{Engine, EngineConfig, ProcessInput, ProgressSink};
use knotwork_server::sources::{gather, FactSource, JsonFileSource};
use knotwork_server::worker_pool::WorkerPool;
use knotwork_server::{KnotworkServer, ServerConfig};

/// Progress goes to the log when there is no websocket to stream to.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

pub struct BuildRequest {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub pinned: Vec<String>,
    pub node_limit: Option<i64>,
    pub link_limit: Option<i64>,
}

pub async fn serve(
    config_path: Option<PathBuf>,
    host: String,
    port: u16,
    data_dir: PathBuf,
) -> anyhow::Result<()> {
    let engine_config = EngineConfig::load(config_path.as_deref())?;
    tracing::info!("Starting Knotwork server on {}:{}", host, port);
    tracing::info!("Snapshots in {}", data_dir.display());

    let server = KnotworkServer::new(engine_config, ServerConfig { host, port, data_dir })?;
    server.start().await
}

pub async fn build(config_path: Option<PathBuf>, request: BuildRequest) -> anyhow::Result<()> {
    let engine_config = EngineConfig::load(config_path.as_deref())?;
    let pool = WorkerPool::from_config(&engine_config)?;
    let engine = Arc::new(Engine::new(engine_config));

    let sources: Vec<Box<dyn FactSource>> = request
        .inputs
        .iter()
        .map(|path| Box::new(JsonFileSource::new(path)) as Box<dyn FactSource>)
        .collect();
    let batches = gather(&sources, &LogProgress).await;

    let input = ProcessInput {
        batches,
        pinned_ids: request.pinned,
        node_limit: request.node_limit,
        link_limit: request.link_limit,
    };
    let response = pool
        .submit(move || engine.process(input, &LogProgress))
        .await?;

    let json = serde_json::to_string_pretty(&response)?;
    match request.output {
        Some(path) => {
            std::fs::write(&path, json)?;
            tracing::info!(
                "Wrote {} nodes and {} links to {}",
                response.nodes.len(),
                response.links.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
