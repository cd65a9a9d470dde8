//! WebSocket feed of committed ledger events.
//!
//! Connection lifecycle:
//! 1. Observer opens `GET /ws/events`
//! 2. Server sends `welcome`, then one frame per committed event
//! 3. Heartbeat every 30s; 3 unanswered heartbeats = disconnect
//!
//! The feed is push-only. Observers that fall behind the broadcast buffer
//! receive a `lagged` frame with the number of skipped events.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::api::types::ApiContext;
use crate::events::CustodyEvent;

/// Heartbeat interval: server sends a heartbeat frame every 30 seconds.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Disconnect after this many heartbeats without a reply (3 × 30s = 90s).
const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Frames sent to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    Welcome { version: &'static str },
    Event { event: CustodyEvent },
    Lagged { skipped: u64 },
    Heartbeat { server_time: String },
}

/// `GET /ws/events`
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(ctx): State<ApiContext>) -> impl IntoResponse {
    // Subscribe before the upgrade completes so no event committed after
    // this request is missed.
    let events = ctx.state.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, events))
}

async fn handle_ws(socket: WebSocket, mut events: broadcast::Receiver<CustodyEvent>) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, rx) = mpsc::channel::<WsOutgoing>(64);

    // Sender task: channel → WebSocket
    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        let mut rx = rx;
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unserializable frame");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let _ = tx
        .send(WsOutgoing::Welcome {
            version: crate::config::APP_VERSION,
        })
        .await;
    tracing::info!("Event observer connected");

    let mut missed_heartbeats = 0u32;
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // Consume initial immediate tick

    loop {
        tokio::select! {
            event = events.recv() => {
                let frame = match event {
                    Ok(event) => WsOutgoing::Event { event },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event observer lagged");
                        WsOutgoing::Lagged { skipped }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(_))) | Some(Ok(Message::Pong(_))) => {
                        missed_heartbeats = 0;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            _ = heartbeat.tick() => {
                if missed_heartbeats >= MAX_MISSED_HEARTBEATS {
                    tracing::info!("{MAX_MISSED_HEARTBEATS} missed heartbeats, disconnecting");
                    break;
                }
                missed_heartbeats += 1;
                let _ = tx.send(WsOutgoing::Heartbeat {
                    server_time: chrono::Utc::now().to_rfc3339(),
                }).await;
            }
        }
    }

    drop(tx);
    let _ = sender_handle.await;
    tracing::info!("Event observer disconnected");
}
