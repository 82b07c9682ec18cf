use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use dashmap::DashMap;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use metrics::{counter, gauge};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shoal_proto::{ClientMessage, Decoded, ServerMessage};

use crate::registry::{NewStream, StreamRegistry};

/// Shared state behind the `/ws` route: the stream catalog plus the outbound
/// channel of every handshaken connection. Connections only enter `clients`
/// once their handshake completes, which is what scopes catalog broadcasts to
/// peers that announced a role.
#[derive(Clone)]
pub struct BeaconState {
    node_id: Arc<str>,
    handshake_timeout: Duration,
    registry: StreamRegistry,
    clients: Arc<DashMap<String, mpsc::UnboundedSender<ServerMessage>>>,
}

impl BeaconState {
    pub fn new(node_id: String, handshake_timeout: Duration) -> Self {
        Self {
            node_id: node_id.into(),
            handshake_timeout,
            registry: StreamRegistry::new(),
            clients: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Push the current catalog to every handshaken connection.
    fn broadcast_stream_list(&self) {
        let streams = self.registry.list();
        debug!(
            count = streams.len(),
            clients = self.clients.len(),
            "broadcasting stream catalog"
        );
        for entry in self.clients.iter() {
            let _ = entry.value().send(ServerMessage::StreamList {
                streams: streams.clone(),
            });
        }
    }

    fn handshake_response(&self, client_id: &str) -> ServerMessage {
        ServerMessage::HandshakeResponse {
            success: true,
            client_id: client_id.to_string(),
            node_id: self.node_id.to_string(),
            message: format!("connected to {}", self.node_id),
        }
    }
}

#[derive(Debug, Error)]
enum HandshakeError {
    #[error("handshake timed out")]
    TimedOut,
    #[error("socket closed before handshake")]
    SocketClosed,
    #[error("websocket error: {0}")]
    Transport(String),
    #[error("handshake carried an empty node_type")]
    EmptyRole,
}

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_handler(State(state): State<BeaconState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: BeaconState) {
    let client_id = Uuid::new_v4().to_string();
    let (ws_tx, mut ws_rx) = socket.split();

    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();
    tokio::spawn(write_outbound(ws_tx, rx, client_id.clone()));

    debug!(client_id = %client_id, "websocket connected");

    let role = match handshake_phase(&state, &client_id, &tx, &mut ws_rx).await {
        Ok(role) => role,
        Err(err) => {
            debug!(client_id = %client_id, error = %err, "connection ended before handshake");
            return;
        }
    };

    counter!("shoal_beacon_handshakes_total", 1, "node_type" => role.clone());
    state.clients.insert(client_id.clone(), tx.clone());
    gauge!(
        "shoal_beacon_connections_active",
        state.clients.len() as f64
    );
    info!(client_id = %client_id, node_type = %role, "client registered");

    while let Some(frame) = ws_rx.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(err) => {
                warn!(client_id = %client_id, error = %err, "websocket error");
                break;
            }
        };
        match msg {
            Message::Text(text) => handle_request(&text, &client_id, &role, &state, &tx),
            Message::Close(_) => break,
            Message::Binary(_) => {
                debug!(client_id = %client_id, "ignoring binary frame");
            }
            // Control frames; axum answers pings itself.
            _ => {}
        }
    }

    state.clients.remove(&client_id);
    gauge!(
        "shoal_beacon_connections_active",
        state.clients.len() as f64
    );
    info!(client_id = %client_id, "client disconnected");
}

/// Forward queued server messages to the socket until either side goes away.
async fn write_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    client_id: String,
) {
    while let Some(msg) = rx.recv().await {
        if let Ok(json) = msg.to_text() {
            if ws_tx.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    }
    debug!(client_id = %client_id, "writer task ended");
}

/// Wait for the opening `handshake` request, bounded by the configured
/// deadline. Pings are answered; any other request is refused with an error
/// envelope but leaves the socket open until the deadline. Returns the
/// announced role.
async fn handshake_phase(
    state: &BeaconState,
    client_id: &str,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    ws_rx: &mut SplitStream<WebSocket>,
) -> Result<String, HandshakeError> {
    let deadline = state.handshake_timeout;
    timeout(deadline, async {
        loop {
            let frame = ws_rx
                .next()
                .await
                .ok_or(HandshakeError::SocketClosed)?
                .map_err(|err| HandshakeError::Transport(err.to_string()))?;
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => return Err(HandshakeError::SocketClosed),
                _ => continue,
            };

            match ClientMessage::decode(&text) {
                Ok(Decoded::Known(ClientMessage::Handshake { node_type })) => {
                    if node_type.trim().is_empty() {
                        let _ = tx.send(ServerMessage::Error {
                            message: "node_type must not be empty".to_string(),
                        });
                        return Err(HandshakeError::EmptyRole);
                    }
                    let _ = tx.send(state.handshake_response(client_id));
                    return Ok(node_type);
                }
                Ok(Decoded::Known(ClientMessage::Ping {})) => {
                    let _ = tx.send(ServerMessage::Pong {
                        timestamp: Utc::now().timestamp_millis(),
                    });
                }
                Ok(Decoded::Known(_)) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: "handshake required".to_string(),
                    });
                }
                Ok(Decoded::Unknown(envelope)) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("unsupported message type \"{}\"", envelope.kind),
                    });
                }
                Err(err) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("invalid message: {err}"),
                    });
                }
            }
        }
    })
    .await
    .map_err(|_| HandshakeError::TimedOut)?
}

/// Dispatch one post-handshake request. Every request gets exactly one
/// response on the issuing connection; catalog mutations additionally fan a
/// `streamList` push out to all handshaken peers.
fn handle_request(
    text: &str,
    client_id: &str,
    role: &str,
    state: &BeaconState,
    tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    let message = match ClientMessage::decode(text) {
        Ok(Decoded::Known(message)) => message,
        Ok(Decoded::Unknown(envelope)) => {
            warn!(client_id = %client_id, kind = %envelope.kind, "unsupported message type");
            let _ = tx.send(ServerMessage::Error {
                message: format!("unsupported message type \"{}\"", envelope.kind),
            });
            return;
        }
        Err(err) => {
            warn!(client_id = %client_id, error = %err, "failed to parse client message");
            let _ = tx.send(ServerMessage::Error {
                message: format!("invalid message: {err}"),
            });
            return;
        }
    };

    match message {
        ClientMessage::Handshake { node_type } => {
            // Re-acknowledged, but the role recorded at first handshake
            // stands for the connection lifetime.
            debug!(client_id = %client_id, requested = %node_type, "repeated handshake");
            let _ = tx.send(state.handshake_response(client_id));
        }
        ClientMessage::RequestStreamList {} => {
            counter!("shoal_beacon_stream_list_requests_total", 1);
            let streams = state.registry.list();
            debug!(client_id = %client_id, count = streams.len(), "stream list requested");
            let _ = tx.send(ServerMessage::StreamList { streams });
        }
        ClientMessage::CreateStream {
            title,
            description,
            quality,
        } => {
            let descriptor = state.registry.register(NewStream {
                title,
                description,
                quality,
                creator: client_id.to_string(),
            });
            info!(
                client_id = %client_id,
                node_type = %role,
                stream_id = %descriptor.stream_id,
                title = %descriptor.title,
                "stream registered"
            );
            counter!("shoal_beacon_streams_created_total", 1);
            gauge!("shoal_beacon_streams_active", state.registry.len() as f64);
            let _ = tx.send(ServerMessage::CreateStreamResponse {
                success: true,
                stream_id: descriptor.stream_id.clone(),
                title: descriptor.title.clone(),
                message: "stream registered".to_string(),
            });
            state.broadcast_stream_list();
        }
        ClientMessage::StopStream { stream_id } => {
            if state.registry.remove(&stream_id) {
                info!(client_id = %client_id, stream_id = %stream_id, "stream withdrawn");
                gauge!("shoal_beacon_streams_active", state.registry.len() as f64);
                let _ = tx.send(ServerMessage::StopStreamResponse {
                    success: true,
                    stream_id: Some(stream_id),
                    message: "stream withdrawn".to_string(),
                });
                state.broadcast_stream_list();
            } else {
                let _ = tx.send(ServerMessage::StopStreamResponse {
                    success: false,
                    stream_id: Some(stream_id),
                    message: "unknown stream".to_string(),
                });
            }
        }
        ClientMessage::Ping {} => {
            let _ = tx.send(ServerMessage::Pong {
                timestamp: Utc::now().timestamp_millis(),
            });
        }
    }
}
