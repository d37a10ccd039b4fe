//! Live tally WebSocket
//!
//! Clients join and leave per-poll topics over one connection. Each joined
//! poll gets a forwarder task that relays its broadcast topic into the
//! connection's outbound queue.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use bson::oid::ObjectId;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::http::AppState;
use crate::live::LiveEvent;
use crate::types::parse_id;

/// Outbound messages queued per connection before forwarders wait
const OUTBOUND_BUFFER: usize = 64;

/// Messages a client may send
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join { poll_id: String },
    #[serde(rename_all = "camelCase")]
    Leave { poll_id: String },
    Ping,
}

/// Control replies. Live events use `LiveEvent`'s own encoding.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Joined { poll_id: String },
    #[serde(rename_all = "camelCase")]
    Left { poll_id: String },
    Pong,
    Error { message: String },
}

/// GET /ws
pub async fn handle_live_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_live_connection(socket, state))
}

async fn handle_live_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let mut joined: HashMap<ObjectId, JoinHandle<()>> = HashMap::new();

    debug!("Live client connected");

    loop {
        tokio::select! {
            Some(text) = out_rx.recv() => {
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(&state, client_msg, &mut joined, &out_tx).await
                            }
                            Err(_) => ServerMessage::Error {
                                message: "Unrecognised message".to_string(),
                            },
                        };
                        match serde_json::to_string(&reply) {
                            Ok(json) => {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "Failed to encode live reply"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "Live socket error");
                        break;
                    }
                }
            }
        }
    }

    for (_, forwarder) in joined.drain() {
        forwarder.abort();
    }
    debug!("Live client disconnected");
}

async fn handle_client_message(
    state: &AppState,
    msg: ClientMessage,
    joined: &mut HashMap<ObjectId, JoinHandle<()>>,
    out_tx: &mpsc::Sender<String>,
) -> ServerMessage {
    match msg {
        ClientMessage::Ping => ServerMessage::Pong,

        ClientMessage::Join { poll_id } => {
            let id = match parse_id(&poll_id, "Poll") {
                Ok(id) => id,
                Err(e) => return ServerMessage::Error { message: e.public_message() },
            };

            match state.stores.polls.find_by_id(&id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    return ServerMessage::Error {
                        message: "Poll not found".to_string(),
                    }
                }
                Err(e) => {
                    warn!(error = %e, poll_id = %id, "Live join lookup failed");
                    return ServerMessage::Error { message: e.public_message() };
                }
            }

            if !joined.contains_key(&id) {
                let rx = state.live.subscribe(&id);
                joined.insert(id, spawn_forwarder(id, rx, out_tx.clone()));
                info!(poll_id = %id, "Live client joined poll");
            }
            ServerMessage::Joined { poll_id: id.to_hex() }
        }

        ClientMessage::Leave { poll_id } => {
            if let Ok(id) = parse_id(&poll_id, "Poll") {
                if let Some(forwarder) = joined.remove(&id) {
                    forwarder.abort();
                }
            }
            ServerMessage::Left { poll_id }
        }
    }
}

/// Relay one poll's topic into the connection queue until either side closes
fn spawn_forwarder(
    poll_id: ObjectId,
    mut rx: broadcast::Receiver<LiveEvent>,
    out_tx: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if out_tx.send(json).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(poll_id = %poll_id, missed, "Live subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
