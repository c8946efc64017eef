//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;

use super::messages::{Frame, ZeroState};
use super::registry::{ClientRegistry, ConnectionId, CLIENT_QUEUE_CAPACITY};
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and starts relaying.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    upgrade(ws, &state)
}

/// Handler for the server root.
///
/// Dashboards open their socket against `/`, which is also where the
/// dashboard page itself lives. Upgrade requests become relay
/// connections; everything else goes to the static file directory.
pub async fn root_handler(
    State(state): State<Arc<AppState>>,
    ws: Option<WebSocketUpgrade>,
    request: Request,
) -> Response {
    if let Some(ws) = ws {
        return upgrade(ws, &state);
    }

    match &state.static_dir {
        Some(dir) => match ServeDir::new(dir).oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        },
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn upgrade(ws: WebSocketUpgrade, state: &AppState) -> Response {
    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Send the zero state, then make the connection visible to the relay.
///
/// The zero state goes out first so it always precedes relayed readings.
/// If it cannot be delivered the connection is never registered and
/// `None` is returned.
async fn open_connection<S>(
    sink: &mut S,
    registry: &ClientRegistry,
) -> Option<(ConnectionId, mpsc::Receiver<Frame>)>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let zero_state = match ZeroState::new().to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize zero state");
            return None;
        }
    };
    if let Err(e) = sink.send(zero_state.into_message()).await {
        tracing::debug!(error = %e, "Failed to send zero state, closing connection");
        return None;
    }

    let (tx, rx) = mpsc::channel::<Frame>(CLIENT_QUEUE_CAPACITY);
    let connection_id = registry.register(tx).await;
    Some((connection_id, rx))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, registry: Arc<ClientRegistry>) {
    let (mut sender, mut receiver) = socket.split();

    let Some((connection_id, mut rx)) = open_connection(&mut sender, &registry).await else {
        return;
    };

    let conn_id_for_send = connection_id.clone();

    // Task to forward frames from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sender.send(frame.into_message()).await {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    error = %e,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let conn_id_for_recv = connection_id.clone();

    // Inbound frames carry nothing the relay needs; read only to notice close
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %conn_id_for_recv, "Client requested close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut recv_task => {}
    }

    // Leave the registry before tearing the socket down
    registry.unregister(&connection_id).await;
    send_task.abort();
    recv_task.abort();
}
