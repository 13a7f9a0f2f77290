//! WebSocket stream of processing progress

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::ServerState;

/// Messages exchanged on `/ws/logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// A progress line from a running request
    #[serde(rename = "log")]
    Log { message: String, timestamp: String },
    /// Keepalive
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error { message: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("Log stream client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.log_tx.subscribe();
    // Replies to client messages go through the send task.
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(8);

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<WsMessage>(&text) {
                        Ok(WsMessage::Ping) => WsMessage::Pong,
                        Ok(other) => {
                            debug!("Ignoring client message: {:?}", other);
                            continue;
                        }
                        Err(e) => {
                            warn!("Failed to parse WebSocket message: {}", e);
                            WsMessage::Error {
                                message: format!("unrecognized message: {e}"),
                            }
                        }
                    };
                    let Ok(json) = serde_json::to_string(&reply) else {
                        continue;
                    };
                    if reply_tx.send(json).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    debug!("Log stream client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                line = rx.recv() => match line {
                    Ok(line) => line,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Log stream client lagged, {} lines skipped", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            if sender.send(Message::Text(outgoing)).await.is_err() {
                debug!("Failed to send to log stream client");
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("Log stream client closed");
}
