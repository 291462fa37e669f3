//! WebSocket support for the desktop frontend.
//!
//! Two streams are served:
//! - `/ws` fans out terminal outcomes and catalog refreshes to every client.
//! - `/artifacts/{id}/progress` forwards the progress of one artifact. It is
//!   latest-wins: a slow client skips intermediate samples.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use cellar_core::{
    Command, Outcome, OutcomeEnvelope, OutcomeSink, ProgressEvent, ProgressPhase, ProgressSample,
    Subscription,
};

use super::artifacts::ErrorResponse;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// An install, update or remove finished.
    Outcome {
        artifact_id: String,
        command: Command,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
    },
    /// A progress sample for one artifact.
    Progress {
        artifact_id: String,
        phase: ProgressPhase,
        sample: ProgressSample,
        /// `HH:MM:SS`, ready for display.
        eta: String,
    },
    /// The catalog was reloaded.
    CatalogRefreshed {
        added: usize,
        removed: usize,
        updates_available: usize,
    },
}

impl WsMessage {
    fn progress(artifact_id: &str, event: ProgressEvent) -> Self {
        Self::Progress {
            artifact_id: artifact_id.to_string(),
            phase: event.phase,
            sample: event.sample,
            eta: event.sample.eta_display(),
        }
    }

    fn type_label(&self) -> &'static str {
        match self {
            WsMessage::Outcome { .. } => "outcome",
            WsMessage::Progress { .. } => "progress",
            WsMessage::CatalogRefreshed { .. } => "catalog_refreshed",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // No receivers just means no client is connected.
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Outcome sink that logs each outcome and relays it to `/ws` clients.
pub struct WsOutcomeSink {
    broadcaster: WsBroadcaster,
}

impl WsOutcomeSink {
    pub fn new(broadcaster: WsBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl OutcomeSink for WsOutcomeSink {
    fn deliver(&self, envelope: &OutcomeEnvelope) {
        let event = &envelope.event;
        info!(
            "{} {}: {}",
            event.command.as_str(),
            event.artifact_id,
            event.outcome
        );
        self.broadcaster.broadcast(WsMessage::Outcome {
            artifact_id: event.artifact_id.clone(),
            command: event.command,
            outcome: event.outcome,
            timestamp: envelope.timestamp,
        });
    }
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                return false;
            }
            WS_MESSAGES_SENT.with_label_values(&[msg.type_label()]).inc();
            true
        }
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            true
        }
    }
}

/// GET /api/v1/ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single outcome stream connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.with_label_values(&["outcomes"]).inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if !send_json(&mut sender, &msg).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    drain_client(&mut receiver).await;

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

/// Reads client frames until the client goes away. Clients are not
/// expected to send anything.
async fn drain_client(receiver: &mut futures::stream::SplitStream<WebSocket>) {
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => debug!("Received text message: {}", text),
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }
}

/// GET /api/v1/artifacts/{id}/progress
///
/// Subscribing never starts work; a client connecting while the artifact is
/// idle simply waits for the next operation.
pub async fn progress_handler(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.registry().contains(&id) {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Artifact not found: {}", id),
            }),
        )
            .into_response();
    }
    let subscription = state.controller().subscribe(&id);
    ws.on_upgrade(move |socket| handle_progress_socket(socket, id, subscription))
}

async fn handle_progress_socket(socket: WebSocket, id: String, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    WS_CONNECTIONS_TOTAL.with_label_values(&["progress"]).inc();
    WS_CONNECTIONS_ACTIVE.inc();
    debug!("Progress client connected for {}", id);

    let forward_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            if !send_json(&mut sender, &WsMessage::progress(&id, event)).await {
                break;
            }
        }
        // Dropping the subscription unsubscribes it.
    });

    drain_client(&mut receiver).await;

    forward_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    debug!("Progress client disconnected");
}
