// WebSocket transport for window summaries and stats updates.

use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use futures::StreamExt;
use sample_core::RingConfig;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::constants::SCHEMA_VERSION;
use crate::model::{StatsSnapshot, WindowSummary};

/// Common header carried by every outbound message; the body is flattened beside it.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub schema_version: &'static str,
    pub timestamp_ms: u64,
    pub monotonic_ms: u64,
    pub sequence: u64,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(app_state: &AppState, message_type: &'static str, body: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            monotonic_ms: app_state.uptime_ms(),
            sequence: app_state.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            message_type,
            body,
        }
    }
}

#[derive(Serialize)]
pub struct HandshakeHello {
    pub server_version: &'static str,
    pub capabilities: Vec<&'static str>,
    pub ring: RingConfig,
    pub block_size: i64,
}

#[derive(Serialize)]
pub struct WindowSummaryBody {
    pub window: WindowSummary,
}

#[derive(Serialize)]
pub struct StatsUpdateBody {
    pub stats: StatsSnapshot,
}

/// Serialize and fan out to every connected client; no subscribers is not an error.
pub fn publish<T: Serialize>(app_state: &AppState, message_type: &'static str, body: T) {
    let message = Envelope::new(app_state, message_type, body);
    match serde_json::to_string(&message) {
        Ok(payload) => {
            let _ = app_state.tx.send(payload);
        }
        Err(err) => warn!(?err, message_type, "failed to encode message"),
    }
}

pub async fn ws_handler(
    AxumState(app_state): AxumState<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// What the socket loop does next.
#[derive(Debug, PartialEq)]
enum Next {
    Reply(Message),
    Ignore,
    Close,
}

/// Clients only ever ping or close; anything else they send is ignored.
fn classify_inbound(inbound: Option<Result<Message, axum::Error>>) -> Next {
    match inbound {
        Some(Ok(Message::Ping(payload))) => Next::Reply(Message::Pong(payload)),
        Some(Ok(Message::Close(_))) | None => Next::Close,
        Some(Ok(_)) => Next::Ignore,
        Some(Err(err)) => {
            warn!(?err, "ws error");
            Next::Close
        }
    }
}

async fn handle_socket(mut socket: WebSocket, app_state: AppState) {
    info!("ws connected");
    let mut rx = app_state.tx.subscribe();
    let mut shutdown_rx = app_state.shutdown_rx();
    let hello = Envelope::new(
        &app_state,
        "handshake_hello",
        HandshakeHello {
            server_version: env!("CARGO_PKG_VERSION"),
            capabilities: vec!["window_summary", "stats_update"],
            ring: app_state.ring.config().clone(),
            block_size: app_state.ring.time_base().block_size(),
        },
    );

    if let Ok(payload) = serde_json::to_string(&hello) {
        if socket.send(Message::Text(payload)).await.is_err() {
            return;
        }
    }

    loop {
        let reply = tokio::select! {
            outbound = rx.recv() => match outbound {
                Ok(payload) => Next::Reply(Message::Text(payload)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "ws client lagging");
                    Next::Ignore
                }
                Err(_) => Next::Close,
            },
            inbound = socket.next() => classify_inbound(inbound),
            _ = async { let _ = shutdown_rx.wait_for(|stopped| *stopped).await; } => {
                let _ = socket.send(Message::Close(None)).await;
                Next::Close
            }
        };
        match reply {
            Next::Reply(message) => {
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            Next::Ignore => {}
            Next::Close => break,
        }
    }
    info!("ws disconnected");
}
