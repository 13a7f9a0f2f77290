//! HTTP + WebSocket server

pub mod handlers;
pub mod router;
pub mod snapshot;
pub mod sources;
pub mod websocket;
pub mod worker_pool;

use std::path::PathBuf;
use std::sync::Arc;

use knotwork_core::{Engine, EngineConfig, ProgressSink};
use tokio::sync::broadcast;
use tracing::info;

use crate::websocket::WsMessage;
use crate::worker_pool::WorkerPool;

/// Progress lines buffered per websocket subscriber before it lags.
const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `snapshot.json`.
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7890,
            data_dir: PathBuf::from(".knotwork"),
        }
    }
}

/// Shared state handed to every handler.
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub pool: WorkerPool,
    pub log_tx: broadcast::Sender<String>,
    pub data_dir: PathBuf,
}

impl ServerState {
    pub fn new(engine: Arc<Engine>, pool: WorkerPool, data_dir: PathBuf) -> Self {
        let (log_tx, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        ServerState {
            engine,
            pool,
            log_tx,
            data_dir,
        }
    }

    /// Send a raw line to every websocket subscriber.
    pub fn broadcast(&self, message: String) -> Result<usize, broadcast::error::SendError<String>> {
        self.log_tx.send(message)
    }

    /// A progress sink that streams to `/ws/logs`.
    pub fn progress(&self) -> BroadcastProgress {
        BroadcastProgress {
            tx: self.log_tx.clone(),
        }
    }
}

/// Forwards progress lines to websocket subscribers as `log` messages.
#[derive(Clone)]
pub struct BroadcastProgress {
    tx: broadcast::Sender<String>,
}

impl ProgressSink for BroadcastProgress {
    fn report(&self, message: &str) {
        info!("{}", message);
        let msg = WsMessage::Log {
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        if let Ok(json) = serde_json::to_string(&msg) {
            // No subscribers is fine.
            let _ = self.tx.send(json);
        }
    }
}

pub struct KnotworkServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl KnotworkServer {
    pub fn new(engine_config: EngineConfig, config: ServerConfig) -> anyhow::Result<Self> {
        let pool = WorkerPool::from_config(&engine_config)?;
        let engine = Arc::new(Engine::new(engine_config));
        let state = Arc::new(ServerState::new(engine, pool, config.data_dir.clone()));
        Ok(KnotworkServer { state, config })
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);
        axum::serve(listener, router::create_router(self.state)).await?;
        Ok(())
    }
}
